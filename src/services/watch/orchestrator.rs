//! Watch orchestrator: wires the local override watcher and remote
//! manifest poller into a single bounded swap queue, and drives the
//! consumer loop that feeds `LifecycleManager::swap`.
//!
//! Swap requests for distinct keys run concurrently; requests for the
//! same key serialize through `LifecycleManager`'s own per-key lock,
//! which rejects an overlapping request rather than queueing it -- a
//! request that loses the race will be superseded by the next watch
//! tick anyway.

use crate::domain::model::Key;
use crate::services::lifecycle::LifecycleManager;
use crate::services::manifest::ManifestLoader;
use crate::services::registry::CandidateRegistry;
use crate::services::watch::local_watcher::LocalOverrideWatcher;
use crate::services::watch::remote_watcher::RemoteManifestWatcher;
use crate::services::watch::WatchError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct WatchOrchestrator {
    swap_tx: mpsc::Sender<Key>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl WatchOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub async fn start(
        registry: Arc<CandidateRegistry>,
        lifecycle: Arc<LifecycleManager>,
        manifest_loader: Option<Arc<ManifestLoader>>,
        override_file: impl Into<PathBuf>,
        debounce: Duration,
        poll_interval: Duration,
        queue_capacity: usize,
    ) -> Result<Self, WatchError> {
        let (swap_tx, swap_rx) = mpsc::channel(queue_capacity);
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut handles = Vec::new();

        let local_watcher = LocalOverrideWatcher::new(override_file, registry.clone(), swap_tx.clone(), debounce);
        local_watcher.apply_once().await?;
        let local_shutdown = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            if let Err(err) = run_local(local_watcher, local_shutdown).await {
                warn!(error = %err, "local override watcher exited");
            }
        }));

        if let Some(loader) = manifest_loader {
            let remote_watcher = RemoteManifestWatcher::new(loader, registry.clone(), swap_tx.clone(), poll_interval);
            let remote_shutdown = shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                remote_watcher.run(remote_shutdown).await;
            }));
        }

        let consumer_shutdown = shutdown_tx.subscribe();
        handles.push(tokio::spawn(run_consumer(lifecycle, swap_rx, consumer_shutdown)));

        Ok(Self { swap_tx, shutdown_tx, handles })
    }

    /// A sender callers (e.g. the operator `swap` CLI command) can use to
    /// enqueue an out-of-band swap request alongside watch-triggered ones.
    pub fn swap_sender(&self) -> mpsc::Sender<Key> {
        self.swap_tx.clone()
    }

    /// Signal every background task to stop and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        drop(self.swap_tx);
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("watch orchestrator shut down");
    }
}

async fn run_local(watcher: LocalOverrideWatcher, mut shutdown: broadcast::Receiver<()>) -> Result<(), WatchError> {
    tokio::select! {
        result = watcher.run() => result,
        _ = shutdown.recv() => Ok(()),
    }
}

async fn run_consumer(lifecycle: Arc<LifecycleManager>, mut swap_rx: mpsc::Receiver<Key>, mut shutdown: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            maybe_key = swap_rx.recv() => {
                let Some(key) = maybe_key else { return };
                let lifecycle = lifecycle.clone();
                tokio::spawn(async move {
                    match lifecycle.swap(&key, None, false).await {
                        Ok(()) => info!(key = %key, "swap applied from watch queue"),
                        Err(err) => warn!(key = %key, error = %err, "swap from watch queue failed"),
                    }
                });
            }
            _ = shutdown.recv() => return,
        }
    }
}
