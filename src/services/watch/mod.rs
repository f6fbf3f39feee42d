//! Filesystem and network watchers that keep live instances aligned with
//! the current registry state: a local override file and a remote
//! manifest poller, both feeding a single bounded swap queue consumed by
//! `WatchOrchestrator`.

pub mod local_watcher;
pub mod orchestrator;
pub mod remote_watcher;

pub use local_watcher::LocalOverrideWatcher;
pub use orchestrator::WatchOrchestrator;
pub use remote_watcher::RemoteManifestWatcher;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("filesystem watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid override file: {0}")]
    OverrideFileInvalid(String),
}
