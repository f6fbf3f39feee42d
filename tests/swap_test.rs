//! Hot-swap scenarios: exactly-once cleanup of the superseded instance,
//! rollback on a failed health probe, and mutual exclusion between two
//! concurrent swap attempts on the same key.

use async_trait::async_trait;
use fulcrum::domain::ports::{HealthStatus, Instance};
use fulcrum::domain::{Candidate, Domain, Key, Source};
use fulcrum::services::lifecycle::{FactoryTable, LifecycleError, LifecycleManager};
use fulcrum::services::registry::CandidateRegistry;
use fulcrum::services::security::FactoryPolicy;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct Probe {
    healthy: AtomicBool,
    cleaned_up: AtomicUsize,
    block_init: Option<Arc<Notify>>,
}

#[async_trait]
impl Instance for Probe {
    async fn init(&self) -> Result<(), String> {
        if let Some(notify) = &self.block_init {
            notify.notified().await;
        }
        Ok(())
    }

    async fn health(&self, _probe: bool) -> HealthStatus {
        if self.healthy.load(Ordering::SeqCst) { HealthStatus::Ready } else { HealthStatus::Unhealthy }
    }

    async fn cleanup(&self) -> Result<(), String> {
        self.cleaned_up.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn candidate(provider: &str, factory: &str) -> Candidate {
    Candidate {
        key: Key::new(Domain::Adapter, "cache"),
        provider: provider.into(),
        factory: factory.into(),
        priority: 1,
        stack_level: 0,
        capabilities: vec![],
        version: None,
        source: Source::Manual,
        registered_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn superseded_instance_is_cleaned_up_exactly_once() {
    let registry = Arc::new(CandidateRegistry::new());
    let key = Key::new(Domain::Adapter, "cache");

    let mut table = FactoryTable::new();
    // A factory whose returned instance is captured so the test can observe cleanup count.
    let shared_first = Arc::new(Probe { healthy: AtomicBool::new(true), cleaned_up: AtomicUsize::new(0), block_init: None });
    let shared_for_factory = shared_first.clone();
    table.register("adapters.shared_first:make", Arc::new(move || shared_for_factory.clone() as Arc<dyn Instance>));
    table.register(
        "adapters.second:make",
        Arc::new(move || Arc::new(Probe { healthy: AtomicBool::new(true), cleaned_up: AtomicUsize::new(0), block_init: None }) as Arc<dyn Instance>),
    );

    let manager = LifecycleManager::new(registry.clone(), Arc::new(table), FactoryPolicy::default());

    registry.register(candidate("a", "adapters.shared_first:make")).unwrap();
    manager.swap(&key, None, false).await.unwrap();
    assert_eq!(shared_first.cleaned_up.load(Ordering::SeqCst), 0);

    registry.register(candidate("b", "adapters.second:make")).unwrap();
    registry.set_override(&key, Some("b".into())).unwrap();
    manager.swap(&key, None, false).await.unwrap();

    assert_eq!(shared_first.cleaned_up.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unhealthy_candidate_is_rolled_back_and_never_installed() {
    let registry = Arc::new(CandidateRegistry::new());
    let key = Key::new(Domain::Adapter, "cache");

    let mut table = FactoryTable::new();
    table.register(
        "adapters.unhealthy:make",
        Arc::new(|| Arc::new(Probe { healthy: AtomicBool::new(false), cleaned_up: AtomicUsize::new(0), block_init: None }) as Arc<dyn Instance>),
    );
    let manager = LifecycleManager::new(registry.clone(), Arc::new(table), FactoryPolicy::default());

    registry.register(candidate("a", "adapters.unhealthy:make")).unwrap();
    let result = manager.swap(&key, None, false).await;

    assert!(matches!(result, Err(LifecycleError::SwapHealthFailed { .. })));
    assert_eq!(manager.state_of(&key).await, None);
}

#[tokio::test]
async fn a_concurrent_swap_on_the_same_key_is_rejected() {
    let registry = Arc::new(CandidateRegistry::new());
    let key = Key::new(Domain::Adapter, "cache");

    let gate = Arc::new(Notify::new());
    let gate_for_factory = gate.clone();
    let mut table = FactoryTable::new();
    table.register(
        "adapters.blocked:make",
        Arc::new(move || {
            Arc::new(Probe { healthy: AtomicBool::new(true), cleaned_up: AtomicUsize::new(0), block_init: Some(gate_for_factory.clone()) })
                as Arc<dyn Instance>
        }),
    );
    let manager = Arc::new(LifecycleManager::new(registry.clone(), Arc::new(table), FactoryPolicy::default()));

    registry.register(candidate("a", "adapters.blocked:make")).unwrap();

    let first_manager = manager.clone();
    let first_key = key.clone();
    let first = tokio::spawn(async move { first_manager.swap(&first_key, None, false).await });

    // Give the first swap a chance to acquire the key lock and block inside init().
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let second = manager.swap(&key, None, false).await;
    assert!(matches!(second, Err(LifecycleError::SwapInProgress(_))));

    gate.notify_one();
    first.await.unwrap().unwrap();
}
