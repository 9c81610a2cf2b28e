//! One supervised source → target pipeline.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use bridge_core::{
    Endpoint, EndpointError, EndpointHealth, HealthStatus, MessageSink, RetryPolicy,
};
use bridge_metrics::{binding_rollup, BindingMetricsSnapshot, MetricsHelper};

/// How long each endpoint gets to wind down during a binding stop.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// A named, unidirectional pipeline gluing a source's poll loop to a
/// retry-wrapped target send.
pub struct Binding {
    name: String,
    kind: &'static str,
    source: Arc<dyn Endpoint>,
    target: Arc<dyn Endpoint>,
    retry: RetryPolicy,
    source_metrics: Arc<MetricsHelper>,
    target_metrics: Arc<MetricsHelper>,
    start_error: Mutex<Option<String>>,
}

/// Health report for one binding: strictly the conjunction of its endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct BindingHealth {
    pub binding_name: String,
    pub binding_type: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_start_error: Option<String>,
    pub source: EndpointHealth,
    pub target: EndpointHealth,
}

impl Binding {
    pub fn new(
        name: String,
        kind: &'static str,
        source: Arc<dyn Endpoint>,
        target: Arc<dyn Endpoint>,
        retry: RetryPolicy,
        source_metrics: Arc<MetricsHelper>,
        target_metrics: Arc<MetricsHelper>,
    ) -> Self {
        Self {
            name,
            kind,
            source,
            target,
            retry,
            source_metrics,
            target_metrics,
            start_error: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Start the pipeline. The target must be ready before the source is
    /// allowed to produce a single message.
    pub async fn start(&self) -> Result<(), EndpointError> {
        info!(binding = %self.name, kind = self.kind, "starting binding");

        if let Err(e) = self.target.start().await {
            self.record_start_error(&e).await;
            return Err(e);
        }
        if let Err(e) = self.source.start().await {
            self.record_start_error(&e).await;
            // Don't leave a half-started binding holding a target session.
            if let Err(stop_err) = self.target.stop().await {
                warn!(binding = %self.name, error = %stop_err, "failed to stop target after source start failure");
            }
            return Err(e);
        }

        if let Err(e) = self.source.poll(self.sink()).await {
            self.record_start_error(&e).await;
            return Err(e);
        }

        *self.start_error.lock().await = None;
        info!(binding = %self.name, "binding started");
        Ok(())
    }

    /// Stop the source poller first so nothing new arrives, then the target.
    pub async fn stop(&self) {
        info!(binding = %self.name, "stopping binding");

        match tokio::time::timeout(STOP_TIMEOUT, self.source.stop()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(binding = %self.name, error = %e, "source stop returned error"),
            Err(_) => warn!(binding = %self.name, "source stop timed out"),
        }
        match tokio::time::timeout(STOP_TIMEOUT, self.target.stop()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(binding = %self.name, error = %e, "target stop returned error"),
            Err(_) => warn!(binding = %self.name, "target stop timed out"),
        }

        info!(binding = %self.name, "binding stopped");
    }

    /// The retry-wrapped sink the source poller drives.
    fn sink(&self) -> MessageSink {
        let target = Arc::clone(&self.target);
        let retry = self.retry.clone();
        Arc::new(move |payload: Vec<u8>| {
            let target = Arc::clone(&target);
            let retry = retry.clone();
            Box::pin(async move { retry.run(|| target.send(&payload)).await })
        })
    }

    pub async fn healthy(&self) -> bool {
        self.source.healthy().await && self.target.healthy().await
    }

    pub async fn health(&self) -> BindingHealth {
        let source = self.source.health().await;
        let target = self.target.health().await;
        BindingHealth {
            binding_name: self.name.clone(),
            binding_type: self.kind.to_string(),
            status: source.status.and(target.status),
            last_start_error: self.start_error.lock().await.clone(),
            source,
            target,
        }
    }

    pub fn metrics(&self) -> BindingMetricsSnapshot {
        binding_rollup(&self.name, self.kind, &self.source_metrics, &self.target_metrics)
    }

    pub async fn record_start_error(&self, error: &EndpointError) {
        *self.start_error.lock().await = Some(error.to_string());
    }
}
