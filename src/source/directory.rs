use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::hash::HashKind;
use crate::io_stream::ContentStream;

/// A real directory on disk.  Names resolve relative to its root.
#[derive(Debug)]
pub struct DirectorySource {
    name:  String,
    root:  PathBuf,
    /// File names directly under `root`, snapshotted at mount time.
    files: Vec<String>,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let name = root.display().to_string();

        let mut files = Vec::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(file_name) = entry.file_name().to_str() {
                files.push(file_name.to_owned());
            }
        }
        files.sort();

        Ok(Self { name, root, files })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File names directly under the root.
    pub fn file_names(&self) -> &[String] {
        &self.files
    }

    /// Map `name` to a path under the root.  Absolute paths and `..`
    /// components never resolve.
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let normalized = name.replace('\\', "/");
        let rel = Path::new(&normalized);
        if rel.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
            return None;
        }
        Some(self.root.join(rel))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_some_and(|p| p.is_file())
    }

    pub fn open(&self, name: &str) -> Result<ContentStream> {
        let path = self.resolve(name).ok_or_else(|| Error::not_found(name))?;
        match File::open(&path) {
            Ok(f) if f.metadata()?.is_file() => Ok(ContentStream::File(f)),
            Ok(_) => Err(Error::not_found(name)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::not_found(name)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn content_hashes(&self, kind: HashKind) -> impl Iterator<Item = u32> + '_ {
        self.files.iter().map(move |f| kind.hash(f))
    }
}
