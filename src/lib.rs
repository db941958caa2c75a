//! Read-only virtual file system over directories, zip packages and MIX
//! archives, plus the Westwood frame codecs used by the content inside them.

pub mod hash;
pub mod codec;
pub mod crypto;
pub mod index;
pub mod io_stream;
pub mod mix;
pub mod source;
pub mod sprite;
pub mod manifest;
pub mod vfs;
pub mod error;

pub use hash::HashKind;
pub use codec::{CodecError, CodecId};
pub use error::{Error, Result};
pub use io_stream::ContentStream;
pub use mix::MixArchive;
pub use source::{ArchiveSource, SourceKind};
pub use sprite::SpriteFrameDecoder;
pub use manifest::Manifest;
pub use vfs::VirtualFileSystem;
