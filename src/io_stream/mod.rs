//! Byte streams handed out by archive sources.
//!
//! Directory sources stream straight from the file on disk.  Archive sources
//! read an entry's bytes up front (MIX entries are a single bounded read, zip
//! entries must be inflated) and hand out an in-memory cursor.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// Readable, seekable content returned by `open`.
#[derive(Debug)]
pub enum ContentStream {
    File(File),
    Memory(Cursor<Vec<u8>>),
}

impl ContentStream {
    /// Read everything from the current position to the end.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self {
            ContentStream::Memory(c) if c.position() == 0 => Ok(c.into_inner()),
            mut other => {
                let mut out = Vec::new();
                other.read_to_end(&mut out)?;
                Ok(out)
            }
        }
    }

    /// Total length of the underlying content.
    pub fn len(&self) -> io::Result<u64> {
        match self {
            ContentStream::File(f)   => Ok(f.metadata()?.len()),
            ContentStream::Memory(c) => Ok(c.get_ref().len() as u64),
        }
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl From<Vec<u8>> for ContentStream {
    fn from(bytes: Vec<u8>) -> Self {
        ContentStream::Memory(Cursor::new(bytes))
    }
}

impl From<File> for ContentStream {
    fn from(f: File) -> Self {
        ContentStream::File(f)
    }
}

impl Read for ContentStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ContentStream::File(f)   => f.read(buf),
            ContentStream::Memory(c) => c.read(buf),
        }
    }
}

impl Seek for ContentStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ContentStream::File(f)   => f.seek(pos),
            ContentStream::Memory(c) => c.seek(pos),
        }
    }
}

/// Read exactly `len` bytes at absolute `offset` of a shared file handle.
///
/// `&File` implements `Read + Seek`, so sources can serve lookups through a
/// shared reference while keeping one handle open for the lifetime of the mount.
pub fn read_segment(file: &File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    let mut handle = file;
    handle.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    handle.read_exact(&mut buf)?;
    Ok(buf)
}
