//! Format40: XOR-diff decoder.
//!
//! ```text
//! 0ccccccc  c>0      XOR c literal bytes from src
//! 00000000  n v      XOR v into n bytes
//! 1ccccccc  c>0      skip c bytes
//! 10000000  w:u16    w == 0            terminate
//!                    w & 0x8000 == 0   skip w & 0x7FFF
//!                    w & 0xC000 == 0x8000  XOR (w & 0x3FFF) literal bytes
//!                    w & 0xC000 == 0xC000  v; XOR v into (w & 0x3FFF) bytes
//! ```

use super::{check_span, CodecError, SourceCursor};

/// Decode a Format40 stream, XORing into the pre-seeded `dest`.
///
/// Returns the destination cursor at the terminator.
pub fn decode_into(src: &[u8], dest: &mut [u8]) -> Result<usize, CodecError> {
    let mut ctx    = SourceCursor::new(src);
    let mut cursor = 0usize;
    let capacity   = dest.len();

    loop {
        let op    = ctx.read_u8()?;
        let count = (op & 0x7F) as usize;

        if op & 0x80 == 0 {
            if count == 0 {
                let n     = ctx.read_u8()? as usize;
                let value = ctx.read_u8()?;
                xor_fill(dest, &mut cursor, n, value)?;
            } else {
                let lit = ctx.read_slice(count)?;
                xor_copy(dest, &mut cursor, lit)?;
            }
            continue;
        }

        if count != 0 {
            check_span(cursor, count, capacity)?;
            cursor += count;
            continue;
        }

        let word = ctx.read_u16()? as usize;
        if word == 0 {
            return Ok(cursor);
        }

        if word & 0x8000 == 0 {
            let n = word & 0x7FFF;
            check_span(cursor, n, capacity)?;
            cursor += n;
        } else if word & 0x4000 == 0 {
            let lit = ctx.read_slice(word & 0x3FFF)?;
            xor_copy(dest, &mut cursor, lit)?;
        } else {
            let value = ctx.read_u8()?;
            xor_fill(dest, &mut cursor, word & 0x3FFF, value)?;
        }
    }
}

#[inline]
fn xor_copy(dest: &mut [u8], cursor: &mut usize, lit: &[u8]) -> Result<(), CodecError> {
    check_span(*cursor, lit.len(), dest.len())?;
    for (d, s) in dest[*cursor..*cursor + lit.len()].iter_mut().zip(lit) {
        *d ^= *s;
    }
    *cursor += lit.len();
    Ok(())
}

#[inline]
fn xor_fill(dest: &mut [u8], cursor: &mut usize, n: usize, value: u8) -> Result<(), CodecError> {
    check_span(*cursor, n, dest.len())?;
    for d in &mut dest[*cursor..*cursor + n] {
        *d ^= value;
    }
    *cursor += n;
    Ok(())
}
