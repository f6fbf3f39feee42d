//! Lifecycle manager: instantiates candidates and drives atomic hot swaps.
//!
//! `spec.md` §9 resolves "how are factories invoked" by noting that dynamic
//! symbol resolution has no idiomatic equivalent here: factories are
//! registered ahead of time in a static `FactoryTable`, keyed by the same
//! `module:symbol` string a manifest or local candidate carries. Swapping
//! the *factory table* at startup is how a deployment chooses which real
//! adapter code a given `module:symbol` reference resolves to.

use crate::domain::model::{Candidate, Key, LifecycleState};
use crate::domain::ports::instance::{HealthStatus, Instance};
use crate::services::registry::{CandidateRegistry, RegistryError};
use crate::services::security::{self, SecurityError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub type Factory = Arc<dyn Fn() -> Arc<dyn Instance> + Send + Sync>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error("no factory registered for '{0}'")]
    UnknownFactory(String),

    #[error("swap already in progress for {0}")]
    SwapInProgress(Key),

    #[error("health check failed for candidate '{provider}' on {key}: {reason}")]
    SwapHealthFailed { key: Key, provider: String, reason: String },

    #[error("provider '{provider}' is not registered for {key}")]
    UnknownProvider { key: Key, provider: String },

    #[error("instance operation failed: {0}")]
    InstanceFailed(String),

    #[error("no live instance for {0}")]
    NoLiveInstance(Key),
}

/// A static table mapping `module:symbol` factory references to constructors.
///
/// Registration does not execute a factory; only `LifecycleManager::swap`
/// does, and only after the factory has passed the allow/block-list check.
#[derive(Default)]
pub struct FactoryTable {
    factories: HashMap<String, Factory>,
}

impl FactoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, reference: impl Into<String>, factory: Factory) {
        self.factories.insert(reference.into(), factory);
    }

    fn get(&self, reference: &str) -> Option<&Factory> {
        self.factories.get(reference)
    }
}

struct LiveEntry {
    provider: String,
    instance: Arc<dyn Instance>,
    state: LifecycleState,
    /// Monotonically increasing registration order, used by `cleanup_all`
    /// to tear down in reverse registration order.
    sequence: u64,
}

/// Drives instantiation, health probing, pause/resume/drain, and hot swaps.
///
/// Swaps on distinct keys run fully in parallel; a `tokio::sync::Mutex` per
/// key enforces at-most-one concurrent swap (and at-most-one concurrent
/// init) on the same key. The `live` map lock is held only for the brief
/// pointer-swap insert, never across `build`/`init`/`health`.
pub struct LifecycleManager {
    registry: Arc<CandidateRegistry>,
    factories: Arc<FactoryTable>,
    policy: security::FactoryPolicy,
    live: Mutex<HashMap<Key, LiveEntry>>,
    key_locks: Mutex<HashMap<Key, Arc<Mutex<()>>>>,
    next_sequence: std::sync::atomic::AtomicU64,
    cleanup_timeout: Duration,
    init_timeout: Duration,
    health_timeout: Duration,
}

impl LifecycleManager {
    pub fn new(registry: Arc<CandidateRegistry>, factories: Arc<FactoryTable>, policy: security::FactoryPolicy) -> Self {
        Self {
            registry,
            factories,
            policy,
            live: Mutex::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
            next_sequence: std::sync::atomic::AtomicU64::new(0),
            cleanup_timeout: Duration::from_secs(5),
            init_timeout: Duration::from_secs(10),
            health_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = timeout;
        self
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    async fn lock_for(&self, key: &Key) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        locks.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn build(&self, candidate: &Candidate) -> Result<Arc<dyn Instance>, LifecycleError> {
        let factory_ref = security::parse_factory(&candidate.factory)?;
        self.policy.check(&factory_ref)?;
        let factory = self
            .factories
            .get(&candidate.factory)
            .ok_or_else(|| LifecycleError::UnknownFactory(candidate.factory.clone()))?;
        Ok(factory())
    }

    /// Resolve the active candidate for `key` (optionally filtered to one
    /// `provider`) and swap it in if it differs from (or has never been)
    /// the live instance. This is what both the orchestrator and the
    /// operator `swap` CLI command call.
    ///
    /// `force` bypasses the no-op short-circuit on an unchanged provider
    /// and skips rollback when `init`/`health` fail, per §4.2 step 4.
    pub async fn swap(&self, key: &Key, provider: Option<&str>, force: bool) -> Result<(), LifecycleError> {
        let key_lock = self.lock_for(key).await;
        let _guard = key_lock.try_lock().map_err(|_| LifecycleError::SwapInProgress(key.clone()))?;

        let candidate = match provider {
            Some(provider) => self
                .registry
                .candidates_for(key)
                .into_iter()
                .find(|c| c.provider == provider)
                .ok_or_else(|| LifecycleError::UnknownProvider { key: key.clone(), provider: provider.to_string() })?,
            None => self.registry.resolve(key, &[], &[])?,
        };
        self.swap_to(key, &candidate, force).await
    }

    async fn swap_to(&self, key: &Key, candidate: &Candidate, force: bool) -> Result<(), LifecycleError> {
        {
            let live = self.live.lock().await;
            if let Some(existing) = live.get(key) {
                if !force && existing.provider == candidate.provider && existing.state.is_terminal_for_swap() {
                    return Ok(());
                }
            }
        }

        let new_instance = self.build(candidate)?;

        info!(key = %key, provider = %candidate.provider, "initializing candidate for swap");
        let init_result = tokio::time::timeout(self.init_timeout, new_instance.init()).await;
        match init_result {
            Ok(Ok(())) => {}
            Ok(Err(reason)) if !force => {
                let _ = new_instance.cleanup().await;
                return Err(LifecycleError::SwapHealthFailed { key: key.clone(), provider: candidate.provider.clone(), reason });
            }
            Err(_) if !force => {
                let _ = new_instance.cleanup().await;
                return Err(LifecycleError::SwapHealthFailed {
                    key: key.clone(),
                    provider: candidate.provider.clone(),
                    reason: "init timed out".into(),
                });
            }
            Ok(Err(reason)) => warn!(key = %key, provider = %candidate.provider, reason, "init failed but force is set, proceeding"),
            Err(_) => warn!(key = %key, provider = %candidate.provider, "init timed out but force is set, proceeding"),
        }

        let health = match tokio::time::timeout(self.health_timeout, new_instance.health(true)).await {
            Ok(status) => status,
            Err(_) => HealthStatus::Unhealthy,
        };
        if health != HealthStatus::Ready && !force {
            warn!(key = %key, provider = %candidate.provider, ?health, "new candidate failed health check, rolling back");
            let _ = new_instance.cleanup().await;
            return Err(LifecycleError::SwapHealthFailed {
                key: key.clone(),
                provider: candidate.provider.clone(),
                reason: format!("reported {health:?} on first probe"),
            });
        }
        if health != HealthStatus::Ready {
            warn!(key = %key, provider = %candidate.provider, ?health, "new candidate failed health check but force is set, proceeding");
        }

        let sequence = self.next_sequence.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let old = {
            let mut live = self.live.lock().await;
            live.insert(
                key.clone(),
                LiveEntry { provider: candidate.provider.clone(), instance: new_instance, state: LifecycleState::Ready, sequence },
            )
        };

        if let Some(old_entry) = old {
            let cleanup = old_entry.instance.cleanup();
            match tokio::time::timeout(self.cleanup_timeout, cleanup).await {
                Ok(Ok(())) => {}
                Ok(Err(reason)) => warn!(key = %key, provider = %old_entry.provider, reason, "old instance cleanup returned an error"),
                Err(_) => warn!(key = %key, provider = %old_entry.provider, "old instance cleanup timed out, proceeding"),
            }
        }

        info!(key = %key, provider = %candidate.provider, "swap complete");
        Ok(())
    }

    pub async fn pause(&self, key: &Key) -> Result<(), LifecycleError> {
        let mut live = self.live.lock().await;
        let entry = live.get_mut(key).ok_or_else(|| LifecycleError::NoLiveInstance(key.clone()))?;
        entry.instance.pause().await.map_err(LifecycleError::InstanceFailed)?;
        entry.state = LifecycleState::Paused;
        Ok(())
    }

    pub async fn resume(&self, key: &Key) -> Result<(), LifecycleError> {
        let mut live = self.live.lock().await;
        let entry = live.get_mut(key).ok_or_else(|| LifecycleError::NoLiveInstance(key.clone()))?;
        entry.instance.resume().await.map_err(LifecycleError::InstanceFailed)?;
        entry.state = LifecycleState::Ready;
        Ok(())
    }

    pub async fn drain(&self, key: &Key) -> Result<(), LifecycleError> {
        let mut live = self.live.lock().await;
        let entry = live.get_mut(key).ok_or_else(|| LifecycleError::NoLiveInstance(key.clone()))?;
        entry.instance.drain().await.map_err(LifecycleError::InstanceFailed)?;
        entry.state = LifecycleState::Draining;
        Ok(())
    }

    pub async fn health(&self, key: &Key, probe: bool) -> Result<HealthStatus, LifecycleError> {
        let live = self.live.lock().await;
        let entry = live.get(key).ok_or_else(|| LifecycleError::NoLiveInstance(key.clone()))?;
        Ok(entry.instance.health(probe).await)
    }

    pub async fn state_of(&self, key: &Key) -> Option<LifecycleState> {
        self.live.lock().await.get(key).map(|e| e.state)
    }

    /// Drain then clean up every live instance, in reverse registration
    /// order. Called once on graceful shutdown after the swap queue has
    /// been drained.
    pub async fn cleanup_all(&self) {
        let mut live = self.live.lock().await;
        let mut entries: Vec<_> = live.drain().collect();
        drop(live);

        entries.sort_by_key(|(_, entry)| std::cmp::Reverse(entry.sequence));

        for (key, entry) in entries {
            let _ = entry.instance.drain().await;
            match tokio::time::timeout(self.cleanup_timeout, entry.instance.cleanup()).await {
                Ok(Ok(())) => info!(key = %key, provider = %entry.provider, "cleaned up on shutdown"),
                Ok(Err(reason)) => warn!(key = %key, provider = %entry.provider, reason, "cleanup failed on shutdown"),
                Err(_) => warn!(key = %key, provider = %entry.provider, "cleanup timed out on shutdown"),
            }
        }
    }
}
