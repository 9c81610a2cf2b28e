//! Per-binding and system-wide metric roll-ups.
//!
//! The binding view takes the source's receive-side figures and the target's
//! send-side figures; reconnection counters sum across both endpoints. The
//! system view sums every counter across bindings and keeps the latest
//! timestamp, treating absent timestamps as null rather than zero.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::endpoint::{format_timestamp, EndpointMetricsSnapshot};
use crate::service::MetricsHelper;

/// Latest of two optional timestamps. `None` only when both are `None`.
pub fn latest_timestamp(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (Some(x), Some(y)) => Some(x.max(y)),
    }
}

/// Aggregated metrics for one binding.
#[derive(Debug, Clone, Serialize)]
pub struct BindingMetricsSnapshot {
    pub name: String,
    pub binding_type: String,
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
    pub components: BindingComponents,
}

/// The per-endpoint breakdown carried alongside the roll-up.
#[derive(Debug, Clone, Serialize)]
pub struct BindingComponents {
    pub source: EndpointMetricsSnapshot,
    pub target: EndpointMetricsSnapshot,
}

/// Roll up one binding from its two endpoint helpers.
pub fn binding_rollup(
    name: &str,
    binding_type: &str,
    source: &MetricsHelper,
    target: &MetricsHelper,
) -> BindingMetricsSnapshot {
    let src = source.endpoint_metrics();
    let tgt = target.endpoint_metrics();

    let last_reconnection = latest_timestamp(
        src.reconnect_attempts.last_update_ms(),
        tgt.reconnect_attempts.last_update_ms(),
    );
    let last_reconnection_error = latest_timestamp(
        src.reconnect_failures.last_update_ms(),
        tgt.reconnect_failures.last_update_ms(),
    );

    BindingMetricsSnapshot {
        name: name.to_string(),
        binding_type: binding_type.to_string(),
        messages_received_total: src.messages_received.value(),
        messages_received_volume: src.messages_received_volume.value(),
        messages_sent_total: tgt.messages_sent.value(),
        messages_sent_volume: tgt.messages_sent_volume.value(),
        errors_sent_total: tgt.errors_sent.value(),
        errors_received_total: src.errors_received.value(),
        reconnection_attempts_total: src.reconnect_attempts.value()
            + tgt.reconnect_attempts.value(),
        reconnection_failures_total: src.reconnect_failures.value()
            + tgt.reconnect_failures.value(),
        last_message_received_time: format_timestamp(src.messages_received.last_update_ms()),
        last_message_received_timestamp: src.messages_received.last_update_ms(),
        last_message_sent_time: format_timestamp(tgt.messages_sent.last_update_ms()),
        last_message_sent_timestamp: tgt.messages_sent.last_update_ms(),
        last_error_received_time: format_timestamp(src.errors_received.last_update_ms()),
        last_error_received_timestamp: src.errors_received.last_update_ms(),
        last_error_sent_time: format_timestamp(tgt.errors_sent.last_update_ms()),
        last_error_sent_timestamp: tgt.errors_sent.last_update_ms(),
        last_reconnection_time: format_timestamp(last_reconnection),
        last_reconnection_timestamp: last_reconnection,
        last_reconnection_error_time: format_timestamp(last_reconnection_error),
        last_reconnection_error_timestamp: last_reconnection_error,
        components: BindingComponents {
            source: source.snapshot(),
            target: target.snapshot(),
        },
    }
}

/// Counters summed across every binding.
#[derive(Debug, Clone, Serialize)]
pub struct SystemTotals {
    pub bindings_total: usize,
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

/// The full metrics document served by the supervisor.
#[derive(Debug, Clone, Serialize)]
pub struct SystemMetricsSnapshot {
    pub system: SystemTotals,
    pub bindings: BTreeMap<String, BindingMetricsSnapshot>,
}

/// Roll up the whole daemon from its binding snapshots.
pub fn system_rollup(bindings: Vec<BindingMetricsSnapshot>) -> SystemMetricsSnapshot {
    let mut totals = SystemTotals {
        bindings_total: bindings.len(),
        messages_received_total: 0,
        messages_received_volume: 0,
        messages_sent_total: 0,
        messages_sent_volume: 0,
        errors_sent_total: 0,
        errors_received_total: 0,
        reconnection_attempts_total: 0,
        reconnection_failures_total: 0,
        last_message_received_time: None,
        last_message_received_timestamp: None,
        last_message_sent_time: None,
        last_message_sent_timestamp: None,
        last_error_received_time: None,
        last_error_received_timestamp: None,
        last_error_sent_time: None,
        last_error_sent_timestamp: None,
        last_reconnection_time: None,
        last_reconnection_timestamp: None,
        last_reconnection_error_time: None,
        last_reconnection_error_timestamp: None,
    };

    let mut by_name = BTreeMap::new();
    for snap in bindings {
        totals.messages_received_total += snap.messages_received_total;
        totals.messages_received_volume += snap.messages_received_volume;
        totals.messages_sent_total += snap.messages_sent_total;
        totals.messages_sent_volume += snap.messages_sent_volume;
        totals.errors_sent_total += snap.errors_sent_total;
        totals.errors_received_total += snap.errors_received_total;
        totals.reconnection_attempts_total += snap.reconnection_attempts_total;
        totals.reconnection_failures_total += snap.reconnection_failures_total;

        totals.last_message_received_timestamp = latest_timestamp(
            totals.last_message_received_timestamp,
            snap.last_message_received_timestamp,
        );
        totals.last_message_sent_timestamp = latest_timestamp(
            totals.last_message_sent_timestamp,
            snap.last_message_sent_timestamp,
        );
        totals.last_error_received_timestamp = latest_timestamp(
            totals.last_error_received_timestamp,
            snap.last_error_received_timestamp,
        );
        totals.last_error_sent_timestamp = latest_timestamp(
            totals.last_error_sent_timestamp,
            snap.last_error_sent_timestamp,
        );
        totals.last_reconnection_timestamp = latest_timestamp(
            totals.last_reconnection_timestamp,
            snap.last_reconnection_timestamp,
        );
        totals.last_reconnection_error_timestamp = latest_timestamp(
            totals.last_reconnection_error_timestamp,
            snap.last_reconnection_error_timestamp,
        );

        by_name.insert(snap.name.clone(), snap);
    }

    totals.last_message_received_time = format_timestamp(totals.last_message_received_timestamp);
    totals.last_message_sent_time = format_timestamp(totals.last_message_sent_timestamp);
    totals.last_error_received_time = format_timestamp(totals.last_error_received_timestamp);
    totals.last_error_sent_time = format_timestamp(totals.last_error_sent_timestamp);
    totals.last_reconnection_time = format_timestamp(totals.last_reconnection_timestamp);
    totals.last_reconnection_error_time =
        format_timestamp(totals.last_reconnection_error_timestamp);

    SystemMetricsSnapshot {
        system: totals,
        bindings: by_name,
    }
}
