//! Ordered mount table over heterogeneous sources.
//!
//! ```no_run
//! use mixfs::VirtualFileSystem;
//!
//! let mut vfs = VirtualFileSystem::new();
//! vfs.mount("content/ra")?;
//! vfs.mount("~content/ra/expand2.mix")?;   // optional
//! vfs.mount("content/ra/conquer.mix")?;
//! let rules = vfs.read("rules.ini")?;
//! # Ok::<(), mixfs::Error>(())
//! ```
//!
//! Earlier mounts shadow later ones.  Bare names (no `/` or `\`) are resolved
//! through a hash cache built at mount time; anything else, and any cache
//! miss, falls back to asking every mount in order.

use std::collections::HashMap;
use std::io::Read;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::hash::HashKind;
use crate::io_stream::ContentStream;
use crate::manifest::Manifest;
use crate::source::{ArchiveSource, SourceKind};

/// Prefix marking a mount whose failure is not an error.
pub const OPTIONAL_PREFIX: char = '~';

#[derive(Debug)]
pub struct MountEntry {
    pub name:     String,
    pub order:    usize,
    pub optional: bool,
    pub source:   ArchiveSource,
}

#[derive(Debug, Default)]
pub struct VirtualFileSystem {
    mounts:        Vec<MountEntry>,
    classic_cache: HashMap<u32, Vec<usize>>,
    crc_cache:     HashMap<u32, Vec<usize>>,
}

impl VirtualFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `name`.  A MIX archive's hash family is detected from its index.
    /// A leading `~` makes the mount optional: failure to open it is logged
    /// and ignored.
    pub fn mount(&mut self, name: &str) -> Result<()> {
        self.mount_as(name, None)
    }

    /// Mount `name`, keying a MIX archive's index on `hash_kind`.
    pub fn mount_with_hash(&mut self, name: &str, hash_kind: HashKind) -> Result<()> {
        self.mount_as(name, Some(hash_kind))
    }

    fn mount_as(&mut self, name: &str, hash_kind: Option<HashKind>) -> Result<()> {
        let (optional, path) = match name.strip_prefix(OPTIONAL_PREFIX) {
            Some(rest) => (true, rest),
            None       => (false, name),
        };

        match ArchiveSource::open_path(path, hash_kind) {
            Ok(source) => {
                self.push(path.to_owned(), optional, source);
                Ok(())
            }
            Err(e) if optional => {
                debug!(mount = path, error = %e, "optional mount skipped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Mount an already-opened source under `name`.
    pub fn mount_source(&mut self, name: impl Into<String>, source: ArchiveSource) {
        self.push(name.into(), false, source);
    }

    fn push(&mut self, name: String, optional: bool, source: ArchiveSource) {
        let id = self.mounts.len();
        for (cache, kind) in [(&mut self.classic_cache, HashKind::Classic),
                              (&mut self.crc_cache, HashKind::Crc32)] {
            for hash in source.content_hashes(kind) {
                let ids = cache.entry(hash).or_default();
                if ids.last() != Some(&id) {
                    ids.push(id);
                }
            }
        }
        debug!(mount = %name, kind = source.kind().name(), order = id, "mounted");
        self.mounts.push(MountEntry { name, order: id, optional, source });
    }

    /// Drop every mount and both caches.  Open handles are released.
    pub fn unmount_all(&mut self) {
        self.mounts.clear();
        self.classic_cache.clear();
        self.crc_cache.clear();
    }

    /// Remove the mount named `name`.  Returns `false` if nothing matched.
    pub fn unmount(&mut self, name: &str) -> bool {
        let name = name.strip_prefix(OPTIONAL_PREFIX).unwrap_or(name);
        let Some(pos) = self.mounts.iter().position(|m| m.name == name) else {
            return false;
        };
        // Mount ids shift after removal, so the caches are rebuilt.
        let mut rest: Vec<MountEntry> = self.mounts.drain(..).collect();
        rest.remove(pos);
        self.unmount_all();
        for m in rest {
            self.push(m.name, m.optional, m.source);
        }
        true
    }

    /// Mount names in priority order.
    pub fn mounts(&self) -> impl Iterator<Item = &str> {
        self.mounts.iter().map(|m| m.name.as_str())
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.len()
    }

    /// Replace the mount table with the folders and packages of `manifest`.
    /// Folders are mounted first, then packages, each in listed order.
    pub fn load_manifest(&mut self, manifest: &Manifest) -> Result<()> {
        self.unmount_all();
        for dir in &manifest.mounts {
            self.mount(dir)?;
        }
        for pkg in &manifest.packages {
            self.mount_as(&pkg.name, pkg.hash)?;
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Option<&MountEntry> {
        if !name.contains(['/', '\\']) {
            if let Some(m) = self.cached(name) {
                trace!(name, mount = %m.name, "cache hit");
                return Some(m);
            }
        }
        self.mounts.iter().find(|m| m.source.exists(name))
    }

    /// Lowest mount id among both caches whose source confirms `name`.
    fn cached(&self, name: &str) -> Option<&MountEntry> {
        let classic = self.classic_cache.get(&HashKind::Classic.hash(name));
        let crc = self.crc_cache.get(&HashKind::Crc32.hash(name));

        let mut ids: Vec<usize> = classic.into_iter().chain(crc).flatten().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .map(|id| &self.mounts[id])
            .find(|m| m.source.exists(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Open `name` from the highest-priority mount that has it.
    pub fn open(&self, name: &str) -> Result<ContentStream> {
        match self.resolve(name) {
            Some(m) => m.source.open(name),
            None    => Err(Error::not_found(name)),
        }
    }

    /// Try `name` + each extension in turn.  An empty extension is the bare
    /// name.  Returns the first hit.
    pub fn open_with_exts(&self, name: &str, exts: &[&str]) -> Result<ContentStream> {
        for ext in exts {
            let candidate = format!("{name}{ext}");
            if let Some(m) = self.resolve(&candidate) {
                return m.source.open(&candidate);
            }
        }
        Err(Error::not_found(name))
    }

    /// Name of the mount that would serve `name`.
    pub fn owner(&self, name: &str) -> Option<&str> {
        self.resolve(name).map(|m| m.name.as_str())
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let mut stream = self.open(name)?;
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Mounts of a given container kind, in priority order.
    pub fn mounts_of_kind(&self, kind: SourceKind) -> impl Iterator<Item = &MountEntry> {
        self.mounts.iter().filter(move |m| m.source.kind() == kind)
    }
}
