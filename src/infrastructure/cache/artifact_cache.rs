//! Content-addressed storage: `{cache_dir}/artifacts/{sha256_hex}`.
//!
//! Grounded on the pack's `ContentHash` digest-naming scheme: a fetched
//! artifact's filename is derived solely from its verified digest, never
//! from anything in the manifest entry, which forecloses a crafted `uri`
//! from writing outside the cache directory.

use crate::services::security::{self, SecurityError};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error(transparent)]
    InvalidPath(#[from] SecurityError),

    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct ArtifactCache {
    base_dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn artifacts_dir(&self) -> PathBuf {
        self.base_dir.join("artifacts")
    }

    fn path_for(&self, sha256_hex: &str) -> Result<PathBuf, CacheError> {
        security::reject_path_traversal(sha256_hex)?;
        let joined = self.artifacts_dir().join(sha256_hex);
        Ok(joined)
    }

    pub fn contains(&self, sha256_hex: &str) -> bool {
        self.path_for(sha256_hex).map(|p| p.exists()).unwrap_or(false)
    }

    pub fn path_if_cached(&self, sha256_hex: &str) -> Option<PathBuf> {
        let path = self.path_for(sha256_hex).ok()?;
        path.exists().then_some(path)
    }

    /// Verify `bytes` hashes to `expected_sha256_hex` and, if so, persist
    /// them at the content-addressed path, returning that path.
    pub fn store_verified(&self, bytes: &[u8], expected_sha256_hex: &str) -> Result<PathBuf, CacheError> {
        let actual = hex_digest(bytes);
        if !actual.eq_ignore_ascii_case(expected_sha256_hex) {
            return Err(CacheError::DigestMismatch { expected: expected_sha256_hex.to_string(), actual });
        }

        let path = self.path_for(&actual)?;
        std::fs::create_dir_all(&self.artifacts_dir())?;
        if !path.exists() {
            std::fs::write(&path, bytes)?;
        }
        Ok(path)
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}
