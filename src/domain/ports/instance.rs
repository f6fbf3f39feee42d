//! The contract every candidate's built instance must satisfy.

use async_trait::async_trait;

/// Health reported by a live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ready,
    Degraded,
    Unhealthy,
}

/// Lifecycle hooks a candidate's live instance may implement.
///
/// Every method defaults to a no-op so a minimal candidate only needs to
/// implement the work it actually does; `health` defaults to reporting
/// `Ready` rather than requiring every candidate to wire up a probe.
#[async_trait]
pub trait Instance: Send + Sync {
    async fn init(&self) -> Result<(), String> {
        Ok(())
    }

    async fn health(&self, _probe: bool) -> HealthStatus {
        HealthStatus::Ready
    }

    async fn cleanup(&self) -> Result<(), String> {
        Ok(())
    }

    async fn pause(&self) -> Result<(), String> {
        Ok(())
    }

    async fn resume(&self) -> Result<(), String> {
        Ok(())
    }

    async fn drain(&self) -> Result<(), String> {
        Ok(())
    }
}
