//! The capability contract every queue adapter satisfies.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::EndpointError;
use crate::state::ConnectionState;

/// Future returned by a message sink invocation.
pub type SinkFuture = Pin<Box<dyn Future<Output = Result<(), EndpointError>> + Send>>;

/// Callback the source poller drives with each received payload.
///
/// The sink's outcome decides whether the underlying message is acknowledged
/// (success) or negatively acknowledged (failure, redeliverable).
pub type MessageSink = Arc<dyn Fn(Vec<u8>) -> SinkFuture + Send + Sync>;

/// Uniform capability set of a queue adapter.
///
/// Concrete adapters are independent crates; the bridge engine programs
/// against this trait only.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Establish the session. On failure the endpoint stays `Disconnected`.
    async fn start(&self) -> Result<(), EndpointError>;

    /// Signal any running poller to terminate and release the session.
    /// Must be idempotent.
    async fn stop(&self) -> Result<(), EndpointError>;

    /// Start the long-running background poller. Returns once the task is
    /// scheduled; the task runs until [`Endpoint::stop`]. At most one poller
    /// per endpoint at a time.
    async fn poll(&self, sink: MessageSink) -> Result<(), EndpointError>;

    /// Deliver one payload to the endpoint's queue. A disconnected endpoint
    /// attempts one reconnect before failing; a send that dies to a
    /// connection error retries once after a successful reconnect.
    async fn send(&self, payload: &[u8]) -> Result<(), EndpointError>;

    /// Cheap health answer from cached state; never a round trip.
    async fn healthy(&self) -> bool;

    /// Minimal server round trip proving the session is usable.
    async fn probe_live(&self) -> bool {
        self.healthy().await
    }

    /// Detailed health report. Runs the live probe and reconciles cached
    /// state with its answer.
    async fn health(&self) -> EndpointHealth;

    /// The queue this endpoint reads from or writes to.
    fn queue_name(&self) -> &str;
}

/// Two-valued health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn and(&self, other: HealthStatus) -> HealthStatus {
        if self.is_healthy() && other.is_healthy() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }
}

/// Health report for one endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointHealth {
    pub status: HealthStatus,
    pub connection: ConnectionState,
    pub queue_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Round-trip time of the live probe, when one ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_conjunction() {
        use HealthStatus::*;
        assert_eq!(Healthy.and(Healthy), Healthy);
        assert_eq!(Healthy.and(Unhealthy), Unhealthy);
        assert_eq!(Unhealthy.and(Healthy), Unhealthy);
        assert_eq!(Unhealthy.and(Unhealthy), Unhealthy);
    }
}
