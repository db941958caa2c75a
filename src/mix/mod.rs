//! Read-only MIX archive source.
//!
//! ```no_run
//! use mixfs::hash::HashKind;
//! use mixfs::mix::MixArchive;
//!
//! let mix = MixArchive::load("conquer.mix", HashKind::Classic)?;
//! if mix.exists("rules.ini") {
//!     let bytes = mix.open("rules.ini")?.into_bytes()?;
//!     println!("{} bytes", bytes.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod header;

use std::fs::File;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::hash::HashKind;
use crate::index::{ArchiveIndex, IndexEntry};
use crate::io_stream::{read_segment, ContentStream};

pub use header::{Dialect, MixHeader, FLAG_CHECKSUM, FLAG_ENCRYPTED};

/// Name-list entry some archives carry; its presence under one hash family
/// identifies which family the index was written with.
pub const LOCAL_DATABASE: &str = "local mix database.dat";

/// Guess the hash family `index` was keyed with.  Counts how many of
/// [`LOCAL_DATABASE`] and `known_names` resolve under each family; CRC32 wins
/// only on a strictly higher count.
pub fn detect_hash_kind(index: &ArchiveIndex, known_names: &[&str]) -> HashKind {
    let hits = |kind: HashKind| {
        std::iter::once(LOCAL_DATABASE)
            .chain(known_names.iter().copied())
            .filter(|n| index.contains(kind.hash(n)))
            .count()
    };
    if hits(HashKind::Crc32) > hits(HashKind::Classic) {
        HashKind::Crc32
    } else {
        HashKind::Classic
    }
}

pub struct MixArchive {
    name:      String,
    file:      File,
    hash_kind: HashKind,
    header:    MixHeader,
    index:     ArchiveIndex,
}

impl MixArchive {
    /// Open and index the archive at `path`.  The handle stays open until drop.
    pub fn load<P: AsRef<Path>>(path: P, hash_kind: HashKind) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = File::open(path)?;
        let archive_len = file.metadata()?.len();

        let header = MixHeader::read(&file, &name, archive_len)?;
        let (index, duplicates) = ArchiveIndex::build(&header.index);
        for dup in &duplicates {
            debug!(archive = %name, hash = dup.hash, offset = dup.offset,
                   "duplicate index entry ignored");
        }
        if header.has_checksum() {
            debug!(archive = %name, "SHA-1 trailer present; not verified");
        }
        debug!(
            archive    = %name,
            entries    = index.len(),
            encrypted  = header.is_encrypted(),
            data_start = header.data_start,
            "mix archive indexed"
        );

        Ok(Self { name, file, hash_kind, header, index })
    }

    /// Like [`MixArchive::load`], but pick the hash family from the index
    /// itself.  `known_names` are filenames expected to be present.
    pub fn load_detected<P: AsRef<Path>>(path: P, known_names: &[&str]) -> Result<Self> {
        let mut mix = Self::load(path, HashKind::Classic)?;
        mix.hash_kind = detect_hash_kind(&mix.index, known_names);
        debug!(archive = %mix.name, hash = mix.hash_kind.name(), "hash family detected");
        Ok(mix)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash_kind(&self) -> HashKind {
        self.hash_kind
    }

    pub fn header(&self) -> &MixHeader {
        &self.header
    }

    pub fn is_encrypted(&self) -> bool {
        self.header.is_encrypted()
    }

    pub fn has_checksum(&self) -> bool {
        self.header.has_checksum()
    }

    /// Absolute offset of the data region.
    pub fn data_start(&self) -> u64 {
        self.header.data_start
    }

    /// Index entries ordered by offset.
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.index.sorted()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Entry for `name`, hashed with this archive's hash kind.
    pub fn entry(&self, name: &str) -> Option<&IndexEntry> {
        self.index.get(self.hash_kind.hash(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.index.contains(self.hash_kind.hash(name))
    }

    /// Read the entry for `name`.  An unknown name is [`Error::NotFound`].
    pub fn open(&self, name: &str) -> Result<ContentStream> {
        let entry = self.entry(name).ok_or_else(|| Error::not_found(name))?;
        self.open_entry(entry)
    }

    /// Read the bytes addressed by `entry`.
    pub fn open_entry(&self, entry: &IndexEntry) -> Result<ContentStream> {
        let offset = self.header.data_start + entry.offset as u64;
        Ok(read_segment(&self.file, offset, entry.length as usize)?.into())
    }

    /// Hashes this archive can answer for `kind`.  An archive only knows the
    /// hash family its index was written with.
    pub fn content_hashes(&self, kind: HashKind) -> impl Iterator<Item = u32> + '_ {
        self.index.hashes().filter(move |_| kind == self.hash_kind)
    }
}

impl std::fmt::Debug for MixArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixArchive")
            .field("name", &self.name)
            .field("hash_kind", &self.hash_kind)
            .field("dialect", &self.header.dialect)
            .field("entries", &self.index.len())
            .finish()
    }
}
