//! Transport-agnostic fetch of a remote manifest document.
//!
//! Concrete adapters (HTTP/S3/GCS/OCI) live in infrastructure; the loader
//! only depends on this trait, matching how `IngestionAdapter`/`EgressAdapter`
//! decouple polling logic from transport in the teacher's adapter ports.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("manifest source unreachable: {0}")]
    Unreachable(String),
    #[error("manifest source returned an error status: {0}")]
    Status(String),
    #[error("manifest source timed out")]
    Timeout,
}

/// Raw bytes plus the content-type hint used to choose a parser.
pub struct FetchedManifest {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Human-readable identity, used in logs/events and circuit breaker scope.
    fn id(&self) -> &str;

    /// Fetch the manifest, optionally conditional on a previously-seen etag.
    async fn fetch(&self, if_none_match: Option<&str>) -> Result<Option<FetchedManifest>, FetchError>;
}
