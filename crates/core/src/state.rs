//! Connection state tracking and cooperative stop signalling.
//!
//! State transitions are centralized in three routines (`mark_connected`,
//! `mark_disconnected`, `mark_reconnecting`) that update the state, the
//! cached last error, and the connection-status gauge together.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use bridge_metrics::MetricsHelper;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::debug;

/// Lifecycle state of an endpoint's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

// ── Stop signal ─────────────────────────────────────────────────────

/// One-shot, broadcast stop flag observed at every loop head.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Set the flag. All waiters wake; later waits return immediately.
    pub fn signal(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the flag is set.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Sleep that returns early when the stop flag is set.
    pub async fn sleep(&self, duration: std::time::Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.wait() => {}
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ── Connection tracker ──────────────────────────────────────────────

/// Per-endpoint connection state machine.
///
/// Shared between an endpoint's poller, sender, and heartbeat; the async
/// mutex serializes the transition routines. The gauge in the metrics
/// helper is 1 exactly while the state is `Connected`.
pub struct ConnectionTracker {
    metrics: Arc<MetricsHelper>,
    state: Mutex<ConnectionState>,
    last_error: Mutex<Option<String>>,
    broken: AtomicBool,
    consecutive_failures: AtomicU32,
}

impl ConnectionTracker {
    pub fn new(metrics: Arc<MetricsHelper>) -> Self {
        metrics.set_connected(false);
        Self {
            metrics,
            state: Mutex::new(ConnectionState::Disconnected),
            last_error: Mutex::new(None),
            broken: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    pub async fn is_connected(&self) -> bool {
        *self.state.lock().await == ConnectionState::Connected
    }

    pub async fn mark_connecting(&self) {
        *self.state.lock().await = ConnectionState::Connecting;
        self.metrics.set_connected(false);
    }

    /// Session established: clear the broken flag, the failure streak and
    /// the cached error, and raise the gauge.
    pub async fn mark_connected(&self) {
        *self.state.lock().await = ConnectionState::Connected;
        self.broken.store(false, Ordering::Release);
        self.consecutive_failures.store(0, Ordering::Release);
        *self.last_error.lock().await = None;
        self.metrics.set_connected(true);
    }

    /// Session gone: drop the gauge and remember why.
    pub async fn mark_disconnected(&self, reason: Option<String>) {
        *self.state.lock().await = ConnectionState::Disconnected;
        self.metrics.set_connected(false);
        if let Some(reason) = reason {
            debug!(reason = %reason, "connection marked down");
            *self.last_error.lock().await = Some(reason);
        }
    }

    pub async fn mark_reconnecting(&self) {
        *self.state.lock().await = ConnectionState::Reconnecting;
        self.metrics.set_connected(false);
    }

    /// Flag a mid-operation session loss; the poll loop reconnects on its
    /// next iteration.
    pub fn set_broken(&self) {
        self.broken.store(true, Ordering::Release);
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// Bump and return the consecutive reconnect-failure streak (1-based).
    pub fn next_reconnect_attempt(&self) -> u32 {
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub async fn record_error(&self, message: String) {
        *self.last_error.lock().await = Some(message);
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.lock().await.clone()
    }

    pub fn metrics(&self) -> &Arc<MetricsHelper> {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use bridge_metrics::{MetricLabels, MetricsService, Role};

    use super::*;

    fn tracker() -> ConnectionTracker {
        let service = Arc::new(MetricsService::new().unwrap());
        let helper = service.helper(MetricLabels {
            binding_name: "b1".into(),
            binding_type: "kubemq".into(),
            role: Role::Source,
            queue_name: "q".into(),
        });
        ConnectionTracker::new(helper)
    }

    #[tokio::test]
    async fn starts_disconnected_with_gauge_down() {
        let t = tracker();
        assert_eq!(t.state().await, ConnectionState::Disconnected);
        assert!(!t.metrics().endpoint_metrics().is_connected());
    }

    #[tokio::test]
    async fn gauge_is_one_iff_connected() {
        let t = tracker();

        t.mark_connecting().await;
        assert!(!t.metrics().endpoint_metrics().is_connected());

        t.mark_connected().await;
        assert_eq!(t.state().await, ConnectionState::Connected);
        assert!(t.metrics().endpoint_metrics().is_connected());

        t.mark_reconnecting().await;
        assert_eq!(t.state().await, ConnectionState::Reconnecting);
        assert!(!t.metrics().endpoint_metrics().is_connected());

        t.mark_connected().await;
        t.mark_disconnected(Some("broker went away".into())).await;
        assert!(!t.metrics().endpoint_metrics().is_connected());
        assert_eq!(t.last_error().await.as_deref(), Some("broker went away"));
    }

    #[tokio::test]
    async fn connect_clears_error_broken_and_failure_streak() {
        let t = tracker();
        t.set_broken();
        t.record_error("boom".into()).await;
        assert_eq!(t.next_reconnect_attempt(), 1);
        assert_eq!(t.next_reconnect_attempt(), 2);

        t.mark_connected().await;
        assert!(!t.is_broken());
        assert_eq!(t.last_error().await, None);
        assert_eq!(t.next_reconnect_attempt(), 1);
    }

    #[tokio::test]
    async fn stop_signal_wakes_waiters() {
        let stop = StopSignal::new();
        assert!(!stop.is_set());

        let waiter = {
            let stop = stop.clone();
            tokio::spawn(async move { stop.wait().await })
        };
        stop.signal();
        waiter.await.unwrap();
        assert!(stop.is_set());

        // Already set: waits return immediately.
        stop.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_aware_sleep_returns_early() {
        let stop = StopSignal::new();
        stop.signal();
        // Would otherwise park for an hour; paused clock makes a hang obvious.
        stop.sleep(std::time::Duration::from_secs(3600)).await;
    }
}
