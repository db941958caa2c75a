//! Format80 (LCW): copy/fill decoder for self-contained frames and tiles.
//!
//! ```text
//! 0cccpppp pppppppp        copy c+3 bytes from dest[cursor - p]
//! 10cccccc        c>0      copy c literal bytes from src
//! 10000000                 terminate
//! 11cccccc pos:u16 c<0x3E  copy c+3 bytes from dest[pos]
//! 11111110 n:u16 v         fill n bytes with v
//! 11111111 n:u16 pos:u16   copy n bytes from dest[pos]
//! ```
//!
//! Back-references copy byte by byte so that overlapping runs repeat the
//! pattern, as the original encoder relies on.

use super::{check_span, CodecError, SourceCursor};

/// Decode a Format80 stream into `dest`, returning the number of bytes written.
pub fn decode_into(src: &[u8], dest: &mut [u8]) -> Result<usize, CodecError> {
    let mut ctx    = SourceCursor::new(src);
    let mut cursor = 0usize;

    loop {
        let op = ctx.read_u8()?;

        if op & 0x80 == 0 {
            let count    = ((op >> 4) as usize) + 3;
            let distance = (((op & 0x0F) as usize) << 8) | ctx.read_u8()? as usize;
            let from = cursor.checked_sub(distance)
                .ok_or(CodecError::InvalidBackReference {
                    target:  cursor as i64 - distance as i64,
                    written: cursor,
                })?;
            copy_within(dest, &mut cursor, from, count)?;
        } else if op & 0x40 == 0 {
            let count = (op & 0x3F) as usize;
            if count == 0 {
                return Ok(cursor);
            }
            let lit = ctx.read_slice(count)?;
            check_span(cursor, count, dest.len())?;
            dest[cursor..cursor + count].copy_from_slice(lit);
            cursor += count;
        } else {
            match op & 0x3F {
                0x3E => {
                    let count = ctx.read_u16()? as usize;
                    let value = ctx.read_u8()?;
                    check_span(cursor, count, dest.len())?;
                    dest[cursor..cursor + count].fill(value);
                    cursor += count;
                }
                0x3F => {
                    let count = ctx.read_u16()? as usize;
                    let from  = ctx.read_u16()? as usize;
                    copy_within(dest, &mut cursor, from, count)?;
                }
                c => {
                    let count = c as usize + 3;
                    let from  = ctx.read_u16()? as usize;
                    copy_within(dest, &mut cursor, from, count)?;
                }
            }
        }
    }
}

/// Copy `count` bytes from the already-written `dest[from..]` to the cursor.
fn copy_within(dest: &mut [u8], cursor: &mut usize, from: usize, count: usize) -> Result<(), CodecError> {
    if from >= *cursor && count > 0 {
        return Err(CodecError::InvalidBackReference { target: from as i64, written: *cursor });
    }
    check_span(*cursor, count, dest.len())?;
    for i in 0..count {
        dest[*cursor + i] = dest[from + i];
    }
    *cursor += count;
    Ok(())
}
