use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::hash::HashKind;
use crate::io_stream::ContentStream;

/// A zip package (`.zip`, `.oramap`).  Entries are addressed by normalized path.
pub struct ZipSource {
    name:    String,
    archive: RefCell<ZipArchive<File>>,
    /// normalized path → name as stored in the central directory
    entries: HashMap<String, String>,
}

/// `\` becomes `/`; a leading `./` or `/` is dropped.
pub fn normalize(name: &str) -> String {
    let name = name.replace('\\', "/");
    let trimmed = name.strip_prefix("./").unwrap_or(&name);
    trimmed.trim_start_matches('/').to_owned()
}

impl ZipSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let archive = match ZipArchive::new(File::open(path)?) {
            Ok(a) => a,
            Err(ZipError::Io(e)) => return Err(Error::Io(e)),
            Err(e) => return Err(Error::malformed(&name, e.to_string())),
        };

        let mut entries = HashMap::with_capacity(archive.len());
        for stored in archive.file_names() {
            if stored.ends_with('/') {
                continue;
            }
            entries.entry(normalize(stored)).or_insert_with(|| stored.to_owned());
        }
        debug!(archive = %name, entries = entries.len(), "zip package indexed");

        Ok(Self { name, archive: RefCell::new(archive), entries })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized entry names, unordered.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize(name))
    }

    /// Inflate the entry into memory.
    pub fn open(&self, name: &str) -> Result<ContentStream> {
        let stored = self.entries.get(&normalize(name)).ok_or_else(|| Error::not_found(name))?;
        let mut archive = self.archive.borrow_mut();
        let mut file = match archive.by_name(stored) {
            Ok(f) => f,
            Err(ZipError::FileNotFound) => return Err(Error::not_found(name)),
            Err(e) => return Err(e.into()),
        };
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)?;
        Ok(buf.into())
    }

    pub fn content_hashes(&self, kind: HashKind) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().map(move |n| kind.hash(n))
    }
}

impl std::fmt::Debug for ZipSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipSource")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .finish()
    }
}
