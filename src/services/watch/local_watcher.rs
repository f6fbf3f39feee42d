//! Local override file watcher.
//!
//! Watches `fulcrum.overrides.yaml` for changes via `notify`, diffing its
//! `overrides: {"domain.key": "provider"}` map against what was last
//! applied and pushing only the changed keys onto the swap queue.

use crate::domain::model::{Domain, Key};
use crate::services::registry::CandidateRegistry;
use crate::services::watch::WatchError;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize, Default)]
struct OverrideFile {
    #[serde(default)]
    overrides: HashMap<String, String>,
}

fn parse_key(raw: &str) -> Option<Key> {
    let (domain, name) = raw.split_once('.')?;
    Domain::from_str(domain).ok().map(|d| Key::new(d, name))
}

pub struct LocalOverrideWatcher {
    path: PathBuf,
    registry: Arc<CandidateRegistry>,
    swap_tx: mpsc::Sender<Key>,
    debounce: Duration,
}

impl LocalOverrideWatcher {
    pub fn new(path: impl Into<PathBuf>, registry: Arc<CandidateRegistry>, swap_tx: mpsc::Sender<Key>, debounce: Duration) -> Self {
        Self { path: path.into(), registry, swap_tx, debounce }
    }

    fn load(&self) -> Result<OverrideFile, WatchError> {
        if !self.path.exists() {
            return Ok(OverrideFile::default());
        }
        let text = std::fs::read_to_string(&self.path)?;
        serde_yaml::from_str(&text).map_err(|e| WatchError::OverrideFileInvalid(e.to_string()))
    }

    async fn apply(&self, key: &str, provider: &str) {
        let Some(parsed) = parse_key(key) else {
            warn!(key, "skipping malformed override key");
            return;
        };
        if let Err(err) = self.registry.set_override(&parsed, Some(provider.to_string())) {
            warn!(key = %parsed, error = %err, "override target rejected");
            return;
        }
        let _ = self.swap_tx.send(parsed).await;
    }

    async fn clear(&self, key: &str) {
        let Some(parsed) = parse_key(key) else { return };
        let _ = self.registry.set_override(&parsed, None);
        let _ = self.swap_tx.send(parsed).await;
    }

    /// Apply the override file's contents once, e.g. at startup.
    pub async fn apply_once(&self) -> Result<(), WatchError> {
        let file = self.load()?;
        for (key, provider) in &file.overrides {
            self.apply(key, provider).await;
        }
        Ok(())
    }

    /// Run until the channel side of the watch callback closes, re-applying
    /// the override file on every filesystem event and debouncing bursts
    /// of writes into a single reload.
    pub async fn run(self) -> Result<(), WatchError> {
        let (fs_tx, mut fs_rx) = mpsc::channel(16);
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if res.is_ok() {
                let _ = fs_tx.blocking_send(());
            }
        })?;

        match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => watcher.watch(parent, RecursiveMode::NonRecursive)?,
            None => watcher.watch(Path::new("."), RecursiveMode::NonRecursive)?,
        }

        let mut last_applied: HashMap<String, String> = HashMap::new();
        loop {
            if fs_rx.recv().await.is_none() {
                return Ok(());
            }
            tokio::time::sleep(self.debounce).await;
            while fs_rx.try_recv().is_ok() {}

            let file = match self.load() {
                Ok(file) => file,
                Err(err) => {
                    warn!(error = %err, "failed to reload override file, keeping previous overrides");
                    continue;
                }
            };

            if file.overrides == last_applied {
                continue;
            }

            for (key, provider) in &file.overrides {
                if last_applied.get(key) == Some(provider) {
                    continue;
                }
                self.apply(key, provider).await;
            }
            for key in last_applied.keys() {
                if !file.overrides.contains_key(key) {
                    self.clear(key).await;
                }
            }

            info!(count = file.overrides.len(), "override file reloaded");
            last_applied = file.overrides;
        }
    }
}
