//! Error taxonomy for the resolution and lifecycle control plane.

use thiserror::Error;

/// Top-level error type unifying every subsystem's error enum.
///
/// CLI handlers and the orchestrator match on the wrapped variants; most
/// other call sites just propagate this with `?`.
#[derive(Debug, Error)]
pub enum FulcrumError {
    #[error(transparent)]
    Registry(#[from] crate::services::registry::RegistryError),

    #[error(transparent)]
    Lifecycle(#[from] crate::services::lifecycle::LifecycleError),

    #[error(transparent)]
    Manifest(#[from] crate::services::manifest::ManifestError),

    #[error(transparent)]
    Security(#[from] crate::services::security::SecurityError),

    #[error(transparent)]
    Watch(#[from] crate::services::watch::WatchError),

    #[error(transparent)]
    Config(#[from] crate::infrastructure::config::ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type FulcrumResult<T> = Result<T, FulcrumError>;

/// Errors from the persisted activity store.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    MigrationError(String),

    #[error("connection pool error: {0}")]
    ConnectionPoolError(String),
}
