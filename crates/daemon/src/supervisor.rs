//! Loads the binding set, owns the metrics registry, and drives every
//! binding's lifecycle concurrently.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info};

use bridge_core::{
    BindingConfig, BridgeConfig, ConfigError, Endpoint, EndpointError, HealthStatus,
    RetryPolicy, RouteSpec,
};
use bridge_ibmmq::IbmMqClient;
use bridge_kubemq::KubeMqClient;
use bridge_metrics::{
    system_rollup, MetricLabels, MetricsHelper, MetricsService, Role, SystemMetricsSnapshot,
};

use crate::binding::{Binding, BindingHealth};

/// Health report across the whole daemon.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub bindings_count: usize,
    pub overall_status: HealthStatus,
    pub bindings: BTreeMap<String, BindingHealth>,
}

/// Owns all bindings and the process-wide metrics registry.
pub struct Supervisor {
    bindings: Vec<Arc<Binding>>,
    metrics: Arc<MetricsService>,
}

impl Supervisor {
    /// Construct every binding from configuration. Synchronous, no network
    /// I/O; a bad spec fails the whole init.
    pub fn init(config: BridgeConfig) -> Result<Self, ConfigError> {
        let metrics = Arc::new(
            MetricsService::new()
                .map_err(|e| ConfigError::Invalid(format!("metrics registry: {e}")))?,
        );

        let mut bindings = Vec::with_capacity(config.bindings.len());
        for spec in &config.bindings {
            info!(binding = %spec.name, kind = spec.route.kind(), "initializing binding");
            let binding = build_binding(spec, &metrics)
                .map_err(|e| ConfigError::Invalid(format!("binding '{}': {e}", spec.name)))?;
            bindings.push(Arc::new(binding));
        }

        Ok(Self { bindings, metrics })
    }

    /// Start all bindings concurrently. One binding's failure never blocks
    /// the others; it is recorded and shows up in the next health query.
    pub async fn start(&self) {
        info!(count = self.bindings.len(), "starting bindings");
        let tasks = self.bindings.iter().map(|binding| {
            let binding = Arc::clone(binding);
            async move {
                if let Err(e) = binding.start().await {
                    error!(binding = %binding.name(), error = %e, "binding failed to start");
                }
            }
        });
        join_all(tasks).await;
    }

    /// Stop all bindings concurrently, waiting for each to wind down.
    pub async fn stop(&self) {
        info!(count = self.bindings.len(), "stopping bindings");
        join_all(self.bindings.iter().map(|binding| binding.stop())).await;
        info!("all bindings stopped");
    }

    pub async fn health(&self) -> SystemHealth {
        let mut overall = HealthStatus::Healthy;
        let mut by_name = BTreeMap::new();
        let reports = join_all(self.bindings.iter().map(|binding| binding.health())).await;
        for report in reports {
            overall = overall.and(report.status);
            by_name.insert(report.binding_name.clone(), report);
        }
        SystemHealth {
            bindings_count: self.bindings.len(),
            overall_status: overall,
            bindings: by_name,
        }
    }

    pub fn find(&self, name: &str) -> Option<&Arc<Binding>> {
        self.bindings.iter().find(|b| b.name() == name)
    }

    pub fn bindings(&self) -> &[Arc<Binding>] {
        &self.bindings
    }

    /// Prometheus text exposition of the shared registry.
    pub fn render_prometheus(&self) -> String {
        self.metrics.render()
    }

    /// JSON roll-up across all bindings.
    pub fn metrics_snapshot(&self) -> SystemMetricsSnapshot {
        system_rollup(self.bindings.iter().map(|b| b.metrics()).collect())
    }
}

fn helper(
    metrics: &Arc<MetricsService>,
    binding: &str,
    endpoint_type: &str,
    role: Role,
    queue: &str,
) -> Arc<MetricsHelper> {
    metrics.helper(MetricLabels {
        binding_name: binding.to_string(),
        binding_type: endpoint_type.to_string(),
        role,
        queue_name: queue.to_string(),
    })
}

/// Build the endpoint pair dictated by the binding's direction tag.
fn build_binding(
    config: &BindingConfig,
    metrics: &Arc<MetricsService>,
) -> Result<Binding, EndpointError> {
    let retry = RetryPolicy::from_config(&config.retry);
    let name = config.name.clone();
    let kind = config.route.kind();

    let (source, target, source_metrics, target_metrics): (
        Arc<dyn Endpoint>,
        Arc<dyn Endpoint>,
        Arc<MetricsHelper>,
        Arc<MetricsHelper>,
    ) = match &config.route {
        RouteSpec::IbmMqToKubemq { source, target } => {
            let source_metrics =
                helper(metrics, &name, "ibm_mq", Role::Source, &source.queue_name);
            let target_metrics =
                helper(metrics, &name, "kubemq", Role::Target, &target.queue_name);
            let src = IbmMqClient::new(&name, source.clone(), source_metrics.clone())?;
            let tgt = KubeMqClient::new(&name, target.clone(), target_metrics.clone())?;
            (Arc::new(src), Arc::new(tgt), source_metrics, target_metrics)
        }
        RouteSpec::KubemqToIbmMq { source, target } => {
            let source_metrics =
                helper(metrics, &name, "kubemq", Role::Source, &source.queue_name);
            let target_metrics =
                helper(metrics, &name, "ibm_mq", Role::Target, &target.queue_name);
            let src = KubeMqClient::new(&name, source.clone(), source_metrics.clone())?;
            let tgt = IbmMqClient::new(&name, target.clone(), target_metrics.clone())?;
            (Arc::new(src), Arc::new(tgt), source_metrics, target_metrics)
        }
        RouteSpec::KubemqToKubemq { source, target } => {
            let source_metrics =
                helper(metrics, &name, "kubemq", Role::Source, &source.queue_name);
            let target_metrics =
                helper(metrics, &name, "kubemq", Role::Target, &target.queue_name);
            let src = KubeMqClient::new(&name, source.clone(), source_metrics.clone())?;
            let tgt = KubeMqClient::new(&name, target.clone(), target_metrics.clone())?;
            (Arc::new(src), Arc::new(tgt), source_metrics, target_metrics)
        }
    };

    Ok(Binding::new(
        name,
        kind,
        source,
        target,
        retry,
        source_metrics,
        target_metrics,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
bindings:
  - name: out
    type: ibm_mq_to_kubemq
    source:
      host_name: 127.0.0.1
      port_number: 1
      queue_manager: QM1
      channel_name: CH1
      queue_name: IN
      username: app
    target:
      address: 127.0.0.1:1
      queue_name: orders
  - name: back
    type: kubemq_to_kubemq
    source: { address: "127.0.0.1:1", queue_name: replies }
    target: { address: "127.0.0.1:1", queue_name: archive }
"#;

    fn supervisor() -> Supervisor {
        let config = BridgeConfig::from_yaml(CONFIG).unwrap();
        Supervisor::init(config).unwrap()
    }

    #[test]
    fn init_builds_all_bindings_without_io() {
        let s = supervisor();
        assert_eq!(s.bindings().len(), 2);
        assert!(s.find("out").is_some());
        assert!(s.find("back").is_some());
        assert!(s.find("missing").is_none());
    }

    #[test]
    fn metrics_snapshot_covers_every_binding() {
        let s = supervisor();
        let snap = s.metrics_snapshot();
        assert_eq!(snap.system.bindings_total, 2);
        assert_eq!(snap.system.messages_received_total, 0);
        assert!(snap.bindings.contains_key("out"));
        assert!(snap.bindings.contains_key("back"));
    }

    #[test]
    fn prometheus_exposition_contains_gauges() {
        let s = supervisor();
        let text = s.render_prometheus();
        // All four endpoint gauges exist before any traffic.
        assert!(text.contains("connection_status"));
        assert!(text.contains("binding_name=\"out\""));
        assert!(text.contains("binding_name=\"back\""));
    }

    #[tokio::test]
    async fn stop_without_start_is_clean_and_idempotent() {
        let s = supervisor();
        s.stop().await;
        s.stop().await;
        assert_eq!(s.metrics_snapshot().system.bindings_total, 2);
    }

    #[tokio::test]
    async fn health_aggregates_unreachable_endpoints_as_unhealthy() {
        // Port 1 never answers, so the probes fail fast.
        let s = supervisor();
        let health = s.health().await;
        assert_eq!(health.bindings_count, 2);
        assert_eq!(health.overall_status, HealthStatus::Unhealthy);
        assert_eq!(health.bindings.len(), 2);
        assert_eq!(
            health.bindings["out"].status,
            HealthStatus::Unhealthy
        );
    }
}
