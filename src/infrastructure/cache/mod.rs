//! Content-addressed artifact cache for manifest-fetched payloads.

pub mod artifact_cache;

pub use artifact_cache::{ArtifactCache, CacheError};
