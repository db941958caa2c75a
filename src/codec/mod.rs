//! Westwood run-length / delta codecs.
//!
//! Both codecs share one call contract: a compressed `src` slice is decoded
//! into a caller-owned `dest` slice of known size, and the number of
//! destination bytes reached is returned.
//!
//! - [`format40`] is an XOR-diff codec: every produced byte is XORed into the
//!   existing destination content, so `dest` must be pre-seeded (usually with
//!   the previously decoded frame).
//! - [`format80`] is a copy/fill codec (LCW): bytes are written directly.
//!
//! Neither codec ever panics on hostile input.  Running out of source before
//! the terminator, or addressing outside `dest`, is a [`CodecError`].

pub mod format40;
pub mod format80;

use thiserror::Error;

// ── CodecId ─────────────────────────────────────────────────────────────────

/// Format tag stored in the top byte of a sprite frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CodecId {
    /// XOR diff against the previous frame in table order.
    Format20 = 0x20,
    /// XOR diff against the frame at an explicit data offset.
    Format40 = 0x40,
    /// Self-contained LCW frame.
    Format80 = 0x80,
}

impl CodecId {
    /// Resolve an on-disk tag.  Returns `None` for unknown tags.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x20 => Some(CodecId::Format20),
            0x40 => Some(CodecId::Format40),
            0x80 => Some(CodecId::Format80),
            _    => None,
        }
    }

    /// Human-readable name (diagnostics only, never parsed).
    pub fn name(self) -> &'static str {
        match self {
            CodecId::Format20 => "format20",
            CodecId::Format40 => "format40",
            CodecId::Format80 => "format80",
        }
    }

    /// `true` for the XOR-diff formats that need a reference frame.
    #[inline]
    pub fn is_delta(self) -> bool {
        !matches!(self, CodecId::Format80)
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("source exhausted at byte {position} before terminator")]
    SourceExhausted { position: usize },
    #[error("write of {count} byte(s) at {cursor} overflows destination of {capacity} byte(s)")]
    DestinationOverflow { cursor: usize, count: usize, capacity: usize },
    #[error("back-reference to byte {target} is outside the {written} byte(s) decoded so far")]
    InvalidBackReference { target: i64, written: usize },
    #[error("unknown frame format tag 0x{0:02x}")]
    UnknownFormat(u8),
    #[error("frame {frame} reference chain exceeds {limit} frame(s) or loops")]
    ReferenceCycle { frame: usize, limit: usize },
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

/// Decode `src` into `dest` with the codec selected by `id`.
///
/// Format20 and Format40 frames share the XOR-diff decoder; they only differ in
/// how the reference frame is located.
pub fn decode_into(id: CodecId, src: &[u8], dest: &mut [u8]) -> Result<usize, CodecError> {
    match id {
        CodecId::Format20 | CodecId::Format40 => format40::decode_into(src, dest),
        CodecId::Format80                     => format80::decode_into(src, dest),
    }
}

// ── Source cursor ────────────────────────────────────────────────────────────

/// Bounds-checked little-endian reader over a compressed stream.
pub(crate) struct SourceCursor<'a> {
    data: &'a [u8],
    pos:  usize,
}

impl<'a> SourceCursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub(crate) fn read_u8(&mut self) -> Result<u8, CodecError> {
        let b = *self.data.get(self.pos)
            .ok_or(CodecError::SourceExhausted { position: self.pos })?;
        self.pos += 1;
        Ok(b)
    }

    #[inline]
    pub(crate) fn read_u16(&mut self) -> Result<u16, CodecError> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(CodecError::SourceExhausted { position: self.data.len() })?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }
}

/// Fail unless `count` bytes starting at `cursor` fit inside `capacity`.
#[inline]
pub(crate) fn check_span(cursor: usize, count: usize, capacity: usize) -> Result<(), CodecError> {
    match cursor.checked_add(count) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(CodecError::DestinationOverflow { cursor, count, capacity }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip() {
        for id in [CodecId::Format20, CodecId::Format40, CodecId::Format80] {
            assert_eq!(CodecId::from_tag(id as u8), Some(id));
        }
        assert_eq!(CodecId::from_tag(0x10), None);
        assert!(CodecId::Format20.is_delta());
        assert!(!CodecId::Format80.is_delta());
    }

    #[test]
    fn cursor_reports_exhaustion() {
        let mut c = SourceCursor::new(&[0x34, 0x12, 0xFF]);
        assert_eq!(c.read_u16().unwrap(), 0x1234);
        assert!(c.read_slice(2).is_err());
        assert_eq!(c.read_u8().unwrap(), 0xFF);
        assert_eq!(c.read_u8(), Err(CodecError::SourceExhausted { position: 3 }));
    }

    #[test]
    fn span_check() {
        assert!(check_span(2, 2, 4).is_ok());
        assert!(check_span(3, 2, 4).is_err());
        assert!(check_span(usize::MAX, 2, 4).is_err());
    }
}
