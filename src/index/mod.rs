//! MIX index table: the raw on-disk layout and the hash-keyed lookup built from it.

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Read};

/// Size of one on-disk index entry: hash, offset, length.
pub const ENTRY_SIZE: usize = 12;
/// Size of the `file_count: u16, data_size: u32` prefix.
pub const PREFIX_SIZE: usize = 6;

/// One `(hash, offset, length)` triple.  `offset` is relative to the data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub hash:   u32,
    pub offset: u32,
    pub length: u32,
}

impl IndexEntry {
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            hash:   reader.read_u32::<LittleEndian>()?,
            offset: reader.read_u32::<LittleEndian>()?,
            length: reader.read_u32::<LittleEndian>()?,
        })
    }

    /// Exclusive end of the entry within the data region.
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.length as u64
    }
}

/// Raw table as it appears on disk, before keying by hash.
#[derive(Debug, Clone, Default)]
pub struct RawIndex {
    pub file_count: u16,
    pub data_size:  u32,
    pub entries:    Vec<IndexEntry>,
}

impl RawIndex {
    /// Parse `[u16 file_count][u32 data_size][file_count × entry]`.
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let file_count = reader.read_u16::<LittleEndian>()?;
        let data_size  = reader.read_u32::<LittleEndian>()?;
        let mut entries = Vec::with_capacity(file_count as usize);
        for _ in 0..file_count {
            entries.push(IndexEntry::read(&mut reader)?);
        }
        Ok(Self { file_count, data_size, entries })
    }

    /// On-disk byte length of this table.
    #[inline]
    pub fn byte_len(&self) -> usize {
        table_len(self.file_count)
    }
}

/// Byte length of a plain index holding `file_count` entries.
#[inline]
pub fn table_len(file_count: u16) -> usize {
    PREFIX_SIZE + file_count as usize * ENTRY_SIZE
}

/// Hash → entry lookup for one archive.  Built once, never mutated.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    entries: HashMap<u32, IndexEntry>,
}

impl ArchiveIndex {
    /// Key `raw` by hash.  Returns the index and the entries dropped because
    /// an earlier entry already claimed their hash.
    pub fn build(raw: &RawIndex) -> (Self, Vec<IndexEntry>) {
        let mut entries = HashMap::with_capacity(raw.entries.len());
        let mut duplicates = Vec::new();
        for e in &raw.entries {
            if entries.contains_key(&e.hash) {
                duplicates.push(*e);
            } else {
                entries.insert(e.hash, *e);
            }
        }
        (Self { entries }, duplicates)
    }

    #[inline]
    pub fn get(&self, hash: u32) -> Option<&IndexEntry> {
        self.entries.get(&hash)
    }

    #[inline]
    pub fn contains(&self, hash: u32) -> bool {
        self.entries.contains_key(&hash)
    }

    pub fn hashes(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// All entries ordered by offset.
    pub fn sorted(&self) -> Vec<IndexEntry> {
        let mut v: Vec<IndexEntry> = self.entries.values().copied().collect();
        v.sort_by_key(|e| (e.offset, e.hash));
        v
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
