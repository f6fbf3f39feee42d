//! Circuit breaker for manifest-source network calls.
//!
//! Same closed/open/half-open state machine and failure-window bookkeeping
//! the teacher's task-chain circuit breaker used, generalized from
//! per-task/per-agent scopes to per-manifest-source scopes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
    pub success_threshold: u32,
    pub failure_window: Duration,
    pub enabled: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::seconds(30),
            success_threshold: 2,
            failure_window: Duration::minutes(5),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// What a circuit breaker guards. Manifest sources today; `Global` is kept
/// for operator-triggered blanket resets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitScope {
    Source(String),
    Global,
}

impl CircuitScope {
    pub fn source(id: impl Into<String>) -> Self {
        Self::Source(id.into())
    }
}

#[derive(Debug, Clone)]
struct FailureRecord {
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Circuit {
    state: CircuitState,
    failures: Vec<FailureRecord>,
    half_open_successes: u32,
    opened_at: Option<DateTime<Utc>>,
    open_count: u32,
}

impl Circuit {
    fn new() -> Self {
        Self { state: CircuitState::Closed, failures: Vec::new(), half_open_successes: 0, opened_at: None, open_count: 0 }
    }

    fn record_failure(&mut self, config: &CircuitBreakerConfig) {
        self.failures.push(FailureRecord { timestamp: Utc::now() });
        let cutoff = Utc::now() - config.failure_window;
        self.failures.retain(|f| f.timestamp > cutoff);

        if self.state == CircuitState::HalfOpen || (self.state == CircuitState::Closed && self.failures.len() as u32 >= config.failure_threshold) {
            self.open();
        }
    }

    fn record_success(&mut self, config: &CircuitBreakerConfig) {
        if self.state == CircuitState::HalfOpen {
            self.half_open_successes += 1;
            if self.half_open_successes >= config.success_threshold {
                self.close();
            }
        }
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Utc::now());
        self.half_open_successes = 0;
        self.open_count += 1;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.half_open_successes = 0;
        self.failures.clear();
    }

    fn allows(&mut self, config: &CircuitBreakerConfig) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if let Some(opened_at) = self.opened_at {
                    if Utc::now() > opened_at + config.open_timeout {
                        self.state = CircuitState::HalfOpen;
                        self.half_open_successes = 0;
                        return true;
                    }
                }
                false
            }
            CircuitState::HalfOpen => true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CircuitCheckResult {
    Allowed,
    Blocked { retry_after: DateTime<Utc> },
    Testing,
}

impl CircuitCheckResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed | Self::Testing)
    }
}

/// Manages one circuit per scope behind a single `RwLock`.
pub struct CircuitBreakerService {
    config: CircuitBreakerConfig,
    circuits: RwLock<HashMap<CircuitScope, Circuit>>,
}

impl CircuitBreakerService {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, circuits: RwLock::new(HashMap::new()) }
    }

    pub fn with_defaults() -> Arc<Self> {
        Arc::new(Self::new(CircuitBreakerConfig::default()))
    }

    pub async fn check(&self, scope: CircuitScope) -> CircuitCheckResult {
        if !self.config.enabled {
            return CircuitCheckResult::Allowed;
        }
        let mut circuits = self.circuits.write().await;
        let circuit = circuits.entry(scope).or_insert_with(Circuit::new);
        if circuit.allows(&self.config) {
            if circuit.state == CircuitState::HalfOpen { CircuitCheckResult::Testing } else { CircuitCheckResult::Allowed }
        } else {
            CircuitCheckResult::Blocked { retry_after: circuit.opened_at.unwrap_or_else(Utc::now) + self.config.open_timeout }
        }
    }

    pub async fn record_failure(&self, scope: CircuitScope, _reason: impl Into<String>) {
        if !self.config.enabled {
            return;
        }
        let mut circuits = self.circuits.write().await;
        circuits.entry(scope).or_insert_with(Circuit::new).record_failure(&self.config);
    }

    pub async fn record_success(&self, scope: CircuitScope) {
        if !self.config.enabled {
            return;
        }
        let mut circuits = self.circuits.write().await;
        if let Some(circuit) = circuits.get_mut(&scope) {
            circuit.record_success(&self.config);
        }
    }

    pub async fn state_of(&self, scope: &CircuitScope) -> Option<CircuitState> {
        self.circuits.read().await.get(scope).map(|c| c.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let service = CircuitBreakerService::new(CircuitBreakerConfig { failure_threshold: 2, ..Default::default() });
        let scope = CircuitScope::source("s3://bucket");
        service.record_failure(scope.clone(), "e1").await;
        assert!(service.check(scope.clone()).await.is_allowed());
        service.record_failure(scope.clone(), "e2").await;
        assert!(!service.check(scope).await.is_allowed());
    }

    #[tokio::test]
    async fn half_open_recovers_on_success_threshold() {
        let service = CircuitBreakerService::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::zero(),
            success_threshold: 1,
            ..Default::default()
        });
        let scope = CircuitScope::source("x");
        service.record_failure(scope.clone(), "e").await;
        assert!(service.check(scope.clone()).await.is_allowed());
        service.record_success(scope.clone()).await;
        assert_eq!(service.state_of(&scope).await, Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn disabled_breaker_always_allows() {
        let service = CircuitBreakerService::new(CircuitBreakerConfig { enabled: false, failure_threshold: 1, ..Default::default() });
        let scope = CircuitScope::Global;
        service.record_failure(scope.clone(), "e").await;
        assert!(service.check(scope).await.is_allowed());
    }
}
