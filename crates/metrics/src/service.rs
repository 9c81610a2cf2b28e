//! Process-wide Prometheus registry and the per-endpoint labelled helper.
//!
//! The service owns the four exported series; every endpoint gets a
//! [`MetricsHelper`] that writes into both the Prometheus series (for the
//! `/metrics` scrape) and its private [`EndpointMetrics`] atomics (for the
//! JSON roll-ups).

use std::sync::Arc;

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::endpoint::{format_timestamp, EndpointMetrics, EndpointMetricsSnapshot};

/// Which side of a binding an endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Source,
    Target,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Target => "target",
        }
    }
}

/// Stable label tuple identifying one endpoint's series.
#[derive(Debug, Clone)]
pub struct MetricLabels {
    pub binding_name: String,
    /// Endpoint type tag, e.g. `ibm_mq` or `kubemq`.
    pub binding_type: String,
    pub role: Role,
    pub queue_name: String,
}

/// Holds the registry and the exported metric families.
pub struct MetricsService {
    registry: Registry,
    messages_count: IntCounterVec,
    messages_volume: IntCounterVec,
    errors_count: IntCounterVec,
    connection_status: IntGaugeVec,
}

const MESSAGE_LABELS: &[&str] = &["binding_name", "binding_type", "direction", "queue_name"];
const STATUS_LABELS: &[&str] = &["binding_name", "binding_type", "queue_name"];

impl MetricsService {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let messages_count = IntCounterVec::new(
            Opts::new(
                "total_messages_count",
                "Total number of messages sent and received",
            ),
            MESSAGE_LABELS,
        )?;
        let messages_volume = IntCounterVec::new(
            Opts::new(
                "total_messages_volume",
                "Total volume of messages sent and received",
            ),
            MESSAGE_LABELS,
        )?;
        let errors_count = IntCounterVec::new(
            Opts::new("total_errors_count", "Total number of errors"),
            MESSAGE_LABELS,
        )?;
        let connection_status = IntGaugeVec::new(
            Opts::new("connection_status", "Connection status of binding"),
            STATUS_LABELS,
        )?;

        registry.register(Box::new(messages_count.clone()))?;
        registry.register(Box::new(messages_volume.clone()))?;
        registry.register(Box::new(errors_count.clone()))?;
        registry.register(Box::new(connection_status.clone()))?;

        Ok(Self {
            registry,
            messages_count,
            messages_volume,
            errors_count,
            connection_status,
        })
    }

    /// Create the labelled view an endpoint writes through. The metric
    /// families are internally shared, so the helper holds plain clones.
    pub fn helper(&self, labels: MetricLabels) -> Arc<MetricsHelper> {
        Arc::new(MetricsHelper {
            messages_count: self.messages_count.clone(),
            messages_volume: self.messages_volume.clone(),
            errors_count: self.errors_count.clone(),
            connection_status: self.connection_status.clone(),
            labels,
            endpoint: Arc::new(EndpointMetrics::new()),
        })
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut out = Vec::new();
        if let Err(e) = encoder.encode(&families, &mut out) {
            tracing::error!(error = %e, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(out).unwrap_or_default()
    }
}

/// Labelled view into the process-wide registry for a single endpoint.
///
/// The helper does not own the registry; it carries the label tuple and
/// the endpoint's roll-up counters.
pub struct MetricsHelper {
    messages_count: IntCounterVec,
    messages_volume: IntCounterVec,
    errors_count: IntCounterVec,
    connection_status: IntGaugeVec,
    labels: MetricLabels,
    endpoint: Arc<EndpointMetrics>,
}

impl MetricsHelper {
    fn series_labels<'a>(&'a self, direction: &'a str) -> [&'a str; 4] {
        [
            &self.labels.binding_name,
            &self.labels.binding_type,
            direction,
            &self.labels.queue_name,
        ]
    }

    pub fn record_received(&self, bytes: usize) {
        let labels = self.series_labels("received");
        self.messages_count.with_label_values(&labels).inc();
        self.messages_volume
            .with_label_values(&labels)
            .inc_by(bytes as u64);
        self.endpoint.messages_received.incr();
        self.endpoint.messages_received_volume.add(bytes as u64);
    }

    pub fn record_sent(&self, bytes: usize) {
        let labels = self.series_labels("sent");
        self.messages_count.with_label_values(&labels).inc();
        self.messages_volume
            .with_label_values(&labels)
            .inc_by(bytes as u64);
        self.endpoint.messages_sent.incr();
        self.endpoint.messages_sent_volume.add(bytes as u64);
    }

    pub fn record_receive_error(&self) {
        self.errors_count
            .with_label_values(&self.series_labels("received"))
            .inc();
        self.endpoint.errors_received.incr();
    }

    pub fn record_send_error(&self) {
        self.errors_count
            .with_label_values(&self.series_labels("sent"))
            .inc();
        self.endpoint.errors_sent.incr();
    }

    pub fn record_reconnect_attempt(&self) {
        self.endpoint.reconnect_attempts.incr();
    }

    pub fn record_reconnect_failure(&self) {
        self.endpoint.reconnect_failures.incr();
    }

    /// Flip the connection-status gauge. 1 iff connected.
    pub fn set_connected(&self, up: bool) {
        self.connection_status
            .with_label_values(&[
                &self.labels.binding_name,
                &self.labels.binding_type,
                &self.labels.queue_name,
            ])
            .set(if up { 1 } else { 0 });
        self.endpoint.set_connected(up);
    }

    pub fn labels(&self) -> &MetricLabels {
        &self.labels
    }

    pub fn endpoint_metrics(&self) -> &Arc<EndpointMetrics> {
        &self.endpoint
    }

    pub fn snapshot(&self) -> EndpointMetricsSnapshot {
        let m = &self.endpoint;
        EndpointMetricsSnapshot {
            name: self.labels.binding_name.clone(),
            endpoint_type: self.labels.binding_type.clone(),
            role: self.labels.role.as_str().to_string(),
            queue_name: self.labels.queue_name.clone(),
            connected: m.is_connected(),
            messages_received_total: m.messages_received.value(),
            messages_received_volume: m.messages_received_volume.value(),
            messages_sent_total: m.messages_sent.value(),
            messages_sent_volume: m.messages_sent_volume.value(),
            errors_sent_total: m.errors_sent.value(),
            errors_received_total: m.errors_received.value(),
            reconnection_attempts_total: m.reconnect_attempts.value(),
            reconnection_failures_total: m.reconnect_failures.value(),
            last_message_received_time: format_timestamp(m.messages_received.last_update_ms()),
            last_message_received_timestamp: m.messages_received.last_update_ms(),
            last_message_sent_time: format_timestamp(m.messages_sent.last_update_ms()),
            last_message_sent_timestamp: m.messages_sent.last_update_ms(),
            last_error_received_time: format_timestamp(m.errors_received.last_update_ms()),
            last_error_received_timestamp: m.errors_received.last_update_ms(),
            last_error_sent_time: format_timestamp(m.errors_sent.last_update_ms()),
            last_error_sent_timestamp: m.errors_sent.last_update_ms(),
            last_reconnection_time: format_timestamp(m.reconnect_attempts.last_update_ms()),
            last_reconnection_timestamp: m.reconnect_attempts.last_update_ms(),
            last_reconnection_error_time: format_timestamp(m.reconnect_failures.last_update_ms()),
            last_reconnection_error_timestamp: m.reconnect_failures.last_update_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helper(service: &Arc<MetricsService>, role: Role) -> Arc<MetricsHelper> {
        service.helper(MetricLabels {
            binding_name: "b1".into(),
            binding_type: "kubemq".into(),
            role,
            queue_name: "orders".into(),
        })
    }

    #[test]
    fn recording_updates_both_views() {
        let service = Arc::new(MetricsService::new().unwrap());
        let h = helper(&service, Role::Source);

        h.record_received(5);
        h.record_received(7);
        h.record_send_error();
        h.set_connected(true);

        let snap = h.snapshot();
        assert_eq!(snap.messages_received_total, 2);
        assert_eq!(snap.messages_received_volume, 12);
        assert_eq!(snap.errors_sent_total, 1);
        assert!(snap.connected);
        assert!(snap.last_message_received_time.is_some());
        assert_eq!(snap.last_message_sent_time, None);

        let text = service.render();
        assert!(text.contains("total_messages_count"));
        assert!(text.contains("total_messages_volume"));
        assert!(text.contains("total_errors_count"));
        assert!(text.contains("connection_status"));
        assert!(text.contains("direction=\"received\""));
        assert!(text.contains("binding_name=\"b1\""));
    }

    #[test]
    fn gauge_tracks_connection_state() {
        let service = Arc::new(MetricsService::new().unwrap());
        let h = helper(&service, Role::Target);

        h.set_connected(true);
        assert!(service.render().contains("connection_status{binding_name=\"b1\""));
        assert!(h.endpoint_metrics().is_connected());

        h.set_connected(false);
        assert!(!h.endpoint_metrics().is_connected());
    }

    #[test]
    fn counters_are_monotone() {
        let service = Arc::new(MetricsService::new().unwrap());
        let h = helper(&service, Role::Source);

        let mut previous = 0;
        for _ in 0..10 {
            h.record_received(1);
            let v = h.snapshot().messages_received_total;
            assert!(v > previous);
            previous = v;
        }
    }
}
