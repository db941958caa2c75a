//! Filename → 32-bit content hash.
//!
//! MIX archives never store filenames; their index is keyed on a hash of the
//! name instead.  Two hash families exist in the wild:
//!
//! - [`HashKind::Classic`]: rotate-fold over the first 12 characters, used by
//!   the first-generation archives.
//! - [`HashKind::Crc32`]: IEEE CRC32 over a padded, uppercased name, used by
//!   later-generation archives.
//!
//! Both must be bit-exact: indices on disk were produced by the original
//! tools and any deviation silently breaks every lookup.
//!
//! Collisions between names that differ only in case, or only beyond the
//! 12th character (classic), are part of the format and are not "fixed" here.

use serde::{Deserialize, Serialize};

/// Number of leading characters that participate in the classic hash.
pub const CLASSIC_NAME_LIMIT: usize = 12;

/// Selects which hash family a source's index is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HashKind {
    #[default]
    Classic,
    Crc32,
}

impl HashKind {
    pub const ALL: [HashKind; 2] = [HashKind::Classic, HashKind::Crc32];

    /// Hash `name` with this algorithm.
    #[inline]
    pub fn hash(self, name: &str) -> u32 {
        match self {
            HashKind::Classic => classic_hash(name),
            HashKind::Crc32   => crc32_hash(name),
        }
    }

    /// Human-readable name (diagnostics and CLI only).
    pub fn name(self) -> &'static str {
        match self {
            HashKind::Classic => "classic",
            HashKind::Crc32   => "crc32",
        }
    }

    /// Parse from a CLI / manifest string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "classic" => Some(HashKind::Classic),
            "crc32"   => Some(HashKind::Crc32),
            _         => None,
        }
    }
}

/// Uppercase `name` into ASCII bytes.  Characters outside ASCII become `?`,
/// matching what an ASCII encoder would have produced.
fn ascii_upper(name: &str) -> impl Iterator<Item = u8> + '_ {
    name.chars().map(|c| {
        if c.is_ascii() { c.to_ascii_uppercase() as u8 } else { b'?' }
    })
}

/// Classic rotate-fold hash.
///
/// Take at most 12 characters, uppercase, NUL-pad to a multiple of four, then
/// fold little-endian `u32` words with `acc = acc.rotate_left(1) + word`.
pub fn classic_hash(name: &str) -> u32 {
    let mut bytes: Vec<u8> = ascii_upper(name).take(CLASSIC_NAME_LIMIT).collect();
    let rem = bytes.len() % 4;
    if rem != 0 {
        bytes.resize(bytes.len() + 4 - rem, 0);
    }

    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .fold(0u32, |acc, word| acc.rotate_left(1).wrapping_add(word))
}

/// CRC32 hash used by later archives.
///
/// When the length is not a multiple of four, the byte `len % 4` is appended,
/// followed by copies of the character at `(len / 4) * 4` until aligned.
pub fn crc32_hash(name: &str) -> u32 {
    let mut bytes: Vec<u8> = ascii_upper(name).collect();
    let len = bytes.len();
    let rem = len & 3;
    if rem != 0 {
        let anchor = (len >> 2) << 2;
        bytes.push(rem as u8);
        let fill = bytes[anchor];
        for _ in 0..(3 - rem) {
            bytes.push(fill);
        }
    }
    crc32fast::hash(&bytes)
}
