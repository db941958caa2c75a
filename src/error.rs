//! Crate-level error taxonomy.
//!
//! Absence ([`Error::NotFound`]) is an ordinary result; everything else means
//! the data is broken.  Structural errors carry the archive or asset name so a
//! failed load can be diagnosed without aborting unrelated ones.

use std::io;
use thiserror::Error;

use crate::codec::CodecError;
use crate::crypto::CryptoError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("file not found: {name}")]
    NotFound { name: String },
    #[error("{archive}: malformed header: {reason}")]
    MalformedHeader { archive: String, reason: String },
    #[error("{asset}: corrupt data: {source}")]
    CodecCorruption {
        asset:  String,
        #[source]
        source: CodecError,
    },
    #[error("{archive}: cannot decrypt header: {source}")]
    CipherKey {
        archive: String,
        #[source]
        source:  CryptoError,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    pub(crate) fn not_found(name: impl Into<String>) -> Self {
        Error::NotFound { name: name.into() }
    }

    pub(crate) fn malformed(archive: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedHeader { archive: archive.into(), reason: reason.into() }
    }

    pub(crate) fn corrupt(asset: impl Into<String>, source: CodecError) -> Self {
        Error::CodecCorruption { asset: asset.into(), source }
    }

    /// `true` when the name simply has no entry; callers probing optional
    /// content should treat this as a normal outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// `true` when the error means the content itself is broken.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::MalformedHeader { .. } | Error::CodecCorruption { .. } | Error::CipherKey { .. }
        )
    }
}
