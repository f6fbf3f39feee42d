//! Broadcast bus for control-plane events.
//!
//! Same envelope/sequencing pattern as the teacher's `UnifiedEvent` bus —
//! a monotonic `SequenceNumber` plus a `tokio::sync::broadcast` channel —
//! narrowed to the event kinds this system actually emits (§6): candidate
//! registration, pre/post-swap, swap failure/completion, domain readiness,
//! and lifecycle errors.

use crate::domain::model::Key;
use crate::infrastructure::logging::secret_scrubbing::scrub_value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CandidateRegistered,
    CandidateUnregistered,
    PreSwap,
    PostSwap,
    SwapFailed,
    SwapComplete,
    DomainReady,
    LifecycleError,
}

/// Whether `SUPPRESS_EVENTS` silences echoing this event to the console
/// sink. Events still post to the broadcast channel either way -- the env
/// var only controls console noise, never subscriber delivery.
#[derive(Debug, Clone, Serialize)]
pub struct UnifiedEvent {
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub key: Option<Key>,
    /// Free-form payload, scrubbed of secret-looking fields before
    /// publication so no sink (console, log, downstream subscriber) ever
    /// sees an unredacted value.
    pub payload: Value,
}

pub struct EventBusConfig {
    pub capacity: usize,
    pub suppress_console: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { capacity: 1024, suppress_console: false }
    }
}

pub struct EventBus {
    sender: broadcast::Sender<UnifiedEvent>,
    sequence: AtomicU64,
    config: EventBusConfig,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.capacity);
        Self { sender, sequence: AtomicU64::new(0), config }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UnifiedEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, kind: EventKind, key: Option<Key>, payload: Value) {
        let sequence = SequenceNumber(self.sequence.fetch_add(1, Ordering::SeqCst));
        let scrubbed = scrub_value(payload);
        let event = UnifiedEvent { sequence, timestamp: Utc::now(), kind, key, payload: scrubbed };

        if !self.config.suppress_console {
            tracing::info!(
                sequence = %event.sequence,
                kind = ?event.kind,
                key = event.key.as_ref().map(|k| k.to_string()),
                payload = %event.payload,
                "event"
            );
        }

        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_numbers_monotonically_increase() {
        let bus = EventBus::new(EventBusConfig::default());
        let mut rx = bus.subscribe();
        bus.publish(EventKind::CandidateRegistered, None, serde_json::json!({}));
        bus.publish(EventKind::CandidateRegistered, None, serde_json::json!({}));
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(second.sequence.0 > first.sequence.0);
    }

    #[tokio::test]
    async fn payload_secrets_are_scrubbed_before_publication() {
        let bus = EventBus::new(EventBusConfig::default());
        let mut rx = bus.subscribe();
        bus.publish(EventKind::LifecycleError, None, serde_json::json!({"token": "abc123xyz"}));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.payload["token"], serde_json::json!("[REDACTED]"));
    }
}
