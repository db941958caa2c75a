//! Mountable content sources.
//!
//! Every container kind answers the same three questions: does a name exist,
//! give me its bytes, and which content hashes can you serve.  The set of
//! kinds is closed, so they are one enum rather than a trait object.

pub mod directory;
pub mod zip_archive;

use std::path::Path;

use crate::error::Result;
use crate::hash::HashKind;
use crate::io_stream::ContentStream;
use crate::mix::MixArchive;

pub use directory::DirectorySource;
pub use zip_archive::ZipSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Directory,
    Zip,
    Mix,
}

impl SourceKind {
    /// Pick the container kind from the name's suffix, ignoring case.
    pub fn classify(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".mix") {
            SourceKind::Mix
        } else if lower.ends_with(".zip") || lower.ends_with(".oramap") {
            SourceKind::Zip
        } else {
            SourceKind::Directory
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Directory => "directory",
            SourceKind::Zip       => "zip",
            SourceKind::Mix       => "mix",
        }
    }
}

#[derive(Debug)]
pub enum ArchiveSource {
    Directory(DirectorySource),
    Zip(ZipSource),
    Mix(MixArchive),
}

impl ArchiveSource {
    /// Open `path` as the kind its suffix names.  `hash_kind` only matters
    /// for MIX archives; `None` detects it from the archive's index.
    pub fn open_path<P: AsRef<Path>>(path: P, hash_kind: Option<HashKind>) -> Result<Self> {
        let path = path.as_ref();
        let kind = SourceKind::classify(&path.to_string_lossy());
        Ok(match kind {
            SourceKind::Directory => ArchiveSource::Directory(DirectorySource::new(path)?),
            SourceKind::Zip       => ArchiveSource::Zip(ZipSource::new(path)?),
            SourceKind::Mix       => ArchiveSource::Mix(match hash_kind {
                Some(forced) => MixArchive::load(path, forced)?,
                None         => MixArchive::load_detected(path, &[])?,
            }),
        })
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            ArchiveSource::Directory(_) => SourceKind::Directory,
            ArchiveSource::Zip(_)       => SourceKind::Zip,
            ArchiveSource::Mix(_)       => SourceKind::Mix,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ArchiveSource::Directory(s) => s.name(),
            ArchiveSource::Zip(s)       => s.name(),
            ArchiveSource::Mix(s)       => s.name(),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        match self {
            ArchiveSource::Directory(s) => s.exists(name),
            ArchiveSource::Zip(s)       => s.exists(name),
            ArchiveSource::Mix(s)       => s.exists(name),
        }
    }

    pub fn open(&self, name: &str) -> Result<ContentStream> {
        match self {
            ArchiveSource::Directory(s) => s.open(name),
            ArchiveSource::Zip(s)       => s.open(name),
            ArchiveSource::Mix(s)       => s.open(name),
        }
    }

    /// Content hashes this source serves under `kind`.
    pub fn content_hashes(&self, kind: HashKind) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            ArchiveSource::Directory(s) => Box::new(s.content_hashes(kind)),
            ArchiveSource::Zip(s)       => Box::new(s.content_hashes(kind)),
            ArchiveSource::Mix(s)       => Box::new(s.content_hashes(kind)),
        }
    }
}

impl From<DirectorySource> for ArchiveSource {
    fn from(s: DirectorySource) -> Self {
        ArchiveSource::Directory(s)
    }
}

impl From<ZipSource> for ArchiveSource {
    fn from(s: ZipSource) -> Self {
        ArchiveSource::Zip(s)
    }
}

impl From<MixArchive> for ArchiveSource {
    fn from(s: MixArchive) -> Self {
        ArchiveSource::Mix(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_suffix() {
        assert_eq!(SourceKind::classify("conquer.mix"), SourceKind::Mix);
        assert_eq!(SourceKind::classify("CONQUER.MIX"), SourceKind::Mix);
        assert_eq!(SourceKind::classify("mod.zip"), SourceKind::Zip);
        assert_eq!(SourceKind::classify("desert.OraMap"), SourceKind::Zip);
        assert_eq!(SourceKind::classify("content/ra"), SourceKind::Directory);
        assert_eq!(SourceKind::classify("mix"), SourceKind::Directory);
    }

    #[test]
    fn open_path_dispatches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let zip_path = dir.path().join("p.zip");
        zip_archive::tests::write_zip(&zip_path, &[("b.txt", b"b")]);

        let d = ArchiveSource::open_path(dir.path(), None).unwrap();
        assert_eq!(d.kind(), SourceKind::Directory);
        assert!(d.exists("a.txt"));

        let z = ArchiveSource::open_path(&zip_path, Some(HashKind::Classic)).unwrap();
        assert_eq!(z.kind(), SourceKind::Zip);
        assert_eq!(z.open("b.txt").unwrap().into_bytes().unwrap(), b"b");
        assert_eq!(z.content_hashes(HashKind::Crc32).collect::<Vec<_>>(),
                   vec![HashKind::Crc32.hash("b.txt")]);
    }
}
