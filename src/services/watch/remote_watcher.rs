//! Remote manifest poller.
//!
//! Polls every configured `ManifestSource` on a fixed interval, re-running
//! the fetch/verify/register pipeline, then pushes every currently known
//! key onto the swap queue so the orchestrator re-resolves it. A swap that
//! would produce no change is a cheap no-op in `LifecycleManager`.

use crate::domain::model::Key;
use crate::services::manifest::ManifestLoader;
use crate::services::registry::CandidateRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

pub struct RemoteManifestWatcher {
    loader: Arc<ManifestLoader>,
    registry: Arc<CandidateRegistry>,
    swap_tx: mpsc::Sender<Key>,
    poll_interval: Duration,
}

impl RemoteManifestWatcher {
    pub fn new(loader: Arc<ManifestLoader>, registry: Arc<CandidateRegistry>, swap_tx: mpsc::Sender<Key>, poll_interval: Duration) -> Self {
        Self { loader, registry, swap_tx, poll_interval }
    }

    pub async fn poll_once(&self) {
        let results = self.loader.load_all().await;
        for (source, outcome) in results {
            match outcome {
                Ok(count) => info!(source, registered = count, "manifest source polled"),
                Err(err) => warn!(source, error = %err, "manifest source poll failed"),
            }
        }

        for candidate in self.registry.list_active(&[], &[]) {
            let _ = self.swap_tx.send(candidate.key).await;
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.poll_once().await,
                _ = shutdown.recv() => return,
            }
        }
    }
}
