//! Per-endpoint operational counters and their JSON snapshot form.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{SecondsFormat, TimeZone, Utc};
use serde::Serialize;

use crate::counter::TimedCounter;

/// Raw operational counters for one endpoint (one side of a binding).
///
/// Counters only ever go up; each carries the timestamp of its last update.
/// The `connected` flag mirrors the connection-status gauge.
#[derive(Debug, Default)]
pub struct EndpointMetrics {
    pub messages_received: TimedCounter,
    pub messages_received_volume: TimedCounter,
    pub messages_sent: TimedCounter,
    pub messages_sent_volume: TimedCounter,
    pub errors_sent: TimedCounter,
    pub errors_received: TimedCounter,
    pub reconnect_attempts: TimedCounter,
    pub reconnect_failures: TimedCounter,
    connected: AtomicBool,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&self, up: bool) {
        self.connected.store(up, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Render an epoch-millisecond timestamp as RFC 3339, UTC.
pub(crate) fn format_timestamp(ms: Option<i64>) -> Option<String> {
    let ms = ms?;
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Point-in-time view of one endpoint's counters, as served over HTTP.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointMetricsSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub endpoint_type: String,
    pub role: String,
    pub queue_name: String,
    pub connected: bool,
    pub messages_received_total: u64,
    pub messages_received_volume: u64,
    pub messages_sent_total: u64,
    pub messages_sent_volume: u64,
    pub errors_sent_total: u64,
    pub errors_received_total: u64,
    pub reconnection_attempts_total: u64,
    pub reconnection_failures_total: u64,
    pub last_message_received_time: Option<String>,
    pub last_message_received_timestamp: Option<i64>,
    pub last_message_sent_time: Option<String>,
    pub last_message_sent_timestamp: Option<i64>,
    pub last_error_received_time: Option<String>,
    pub last_error_received_timestamp: Option<i64>,
    pub last_error_sent_time: Option<String>,
    pub last_error_sent_timestamp: Option<i64>,
    pub last_reconnection_time: Option<String>,
    pub last_reconnection_timestamp: Option<i64>,
    pub last_reconnection_error_time: Option<String>,
    pub last_reconnection_error_timestamp: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_flag_roundtrip() {
        let m = EndpointMetrics::new();
        assert!(!m.is_connected());
        m.set_connected(true);
        assert!(m.is_connected());
        m.set_connected(false);
        assert!(!m.is_connected());
    }

    #[test]
    fn format_timestamp_none_passthrough() {
        assert_eq!(format_timestamp(None), None);
    }

    #[test]
    fn format_timestamp_renders_rfc3339() {
        let rendered = format_timestamp(Some(1_700_000_000_000)).unwrap();
        assert!(rendered.starts_with("2023-11-14T"));
        assert!(rendered.ends_with('Z'));
    }
}
