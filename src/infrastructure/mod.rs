//! Infrastructure layer
//!
//! Adapters implementing the `domain::ports` traits against concrete
//! external systems: SQLite persistence, content-addressed artifact
//! caching, Ed25519 signature verification, structured logging, and
//! hierarchical configuration loading.

pub mod cache;
pub mod config;
pub mod logging;
pub mod manifest_sources;
pub mod persistence;
pub mod signing;
