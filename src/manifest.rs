//! JSON mount manifest.
//!
//! ```json
//! {
//!   "mounts":   ["content/ra", "~content/ra/expand"],
//!   "packages": [
//!     { "name": "content/ra/conquer.mix" },
//!     { "name": "content/ts/cache.mix", "hash": "Crc32" }
//!   ]
//! }
//! ```
//!
//! Folders are mounted before packages.  A `~` prefix on any name makes that
//! mount optional.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::hash::HashKind;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    /// Hash family of the package's index; detected from the index when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<HashKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub mounts:   Vec<String>,
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
}

impl Manifest {
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mounts_and_packages() {
        let m = Manifest::from_json(r#"{
            "mounts": ["a", "~b"],
            "packages": [{"name": "x.mix"}, {"name": "y.mix", "hash": "Crc32"}]
        }"#).unwrap();
        assert_eq!(m.mounts, vec!["a", "~b"]);
        assert_eq!(m.packages[0].hash, None);
        assert_eq!(m.packages[1].hash, Some(HashKind::Crc32));
    }

    #[test]
    fn missing_sections_default_empty() {
        let m = Manifest::from_json("{}").unwrap();
        assert!(m.mounts.is_empty() && m.packages.is_empty());
    }

    #[test]
    fn rejects_bad_json() {
        assert!(matches!(Manifest::from_json("{mounts"), Err(ManifestError::Json(_))));
    }

    #[test]
    fn survives_serialization() {
        let m = Manifest {
            mounts:   vec!["content".into()],
            packages: vec![PackageSpec { name: "p.zip".into(), hash: None }],
        };
        assert_eq!(Manifest::from_json(&m.to_json().unwrap()).unwrap(), m);
    }
}
