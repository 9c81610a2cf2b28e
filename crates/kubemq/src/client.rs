//! KubeMQ endpoint client over the queues REST gateway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use bridge_core::{
    ConnectionTracker, Endpoint, EndpointError, EndpointHealth, ErrorKind, HealthStatus,
    KubeMqSpec, MessageSink, ReconnectPolicy, StopSignal,
};
use bridge_metrics::MetricsHelper;

use crate::classify;

const IDLE_DELAY: Duration = Duration::from_millis(100);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

// ── Gateway wire types ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct QueueMessage {
    #[serde(rename = "ClientID")]
    client_id: String,
    #[serde(rename = "Channel")]
    channel: String,
    /// Base64-encoded payload.
    #[serde(rename = "Body")]
    body: String,
}

#[derive(Debug, Serialize)]
struct ReceiveRequest {
    #[serde(rename = "ClientID")]
    client_id: String,
    #[serde(rename = "Channel")]
    channel: String,
    #[serde(rename = "MaxNumberOfMessages")]
    max_messages: u32,
    #[serde(rename = "WaitTimeSeconds")]
    wait_time_seconds: u64,
    #[serde(rename = "IsPeak")]
    is_peak: bool,
}

#[derive(Debug, Deserialize)]
struct SendResult {
    #[serde(rename = "IsError", default)]
    is_error: bool,
    #[serde(rename = "Error", default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct ReceiveResult {
    #[serde(rename = "IsError", default)]
    is_error: bool,
    #[serde(rename = "Error", default)]
    error: String,
    #[serde(rename = "Messages", default)]
    messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Deserialize)]
struct ReceivedMessage {
    #[serde(rename = "Body", default)]
    body: String,
}

// ── Client ──────────────────────────────────────────────────────────

/// KubeMQ queue client. Cheap to clone; state lives behind one inner.
#[derive(Clone)]
pub struct KubeMqClient {
    inner: Arc<Inner>,
}

struct Inner {
    binding: String,
    spec: KubeMqSpec,
    http: reqwest::Client,
    base_url: String,
    tracker: ConnectionTracker,
    reconnect: ReconnectPolicy,
    stop: StopSignal,
    polling: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl KubeMqClient {
    pub fn new(
        binding: &str,
        spec: KubeMqSpec,
        metrics: Arc<MetricsHelper>,
    ) -> Result<Self, EndpointError> {
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(10));

        if spec.tls {
            if let Some(path) = &spec.tls_ca_file {
                let pem = std::fs::read(path).map_err(|e| {
                    EndpointError::configuration(format!("cannot read CA file '{path}': {e}"))
                })?;
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    EndpointError::configuration(format!("invalid CA file '{path}': {e}"))
                })?;
                builder = builder.add_root_certificate(cert);
            }
            if let (Some(cert_path), Some(key_path)) = (&spec.tls_cert_file, &spec.tls_key_file) {
                let mut pem = std::fs::read(cert_path).map_err(|e| {
                    EndpointError::configuration(format!(
                        "cannot read client cert '{cert_path}': {e}"
                    ))
                })?;
                let key = std::fs::read(key_path).map_err(|e| {
                    EndpointError::configuration(format!(
                        "cannot read client key '{key_path}': {e}"
                    ))
                })?;
                pem.extend_from_slice(&key);
                let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                    EndpointError::configuration(format!("invalid client identity: {e}"))
                })?;
                builder = builder.identity(identity);
            }
        }

        let http = builder
            .build()
            .map_err(|e| EndpointError::configuration(format!("http client: {e}")))?;

        let scheme = if spec.tls { "https" } else { "http" };
        let base_url = format!("{scheme}://{}", spec.address);
        let reconnect = ReconnectPolicy::new(spec.reconnect_delay, spec.max_reconnect_attempts);

        Ok(Self {
            inner: Arc::new(Inner {
                binding: binding.to_string(),
                spec,
                http,
                base_url,
                tracker: ConnectionTracker::new(metrics),
                reconnect,
                stop: StopSignal::new(),
                polling: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }

    #[cfg(test)]
    pub(crate) fn tracker(&self) -> &ConnectionTracker {
        &self.inner.tracker
    }
}

#[async_trait]
impl Endpoint for KubeMqClient {
    async fn start(&self) -> Result<(), EndpointError> {
        let inner = &self.inner;
        inner.tracker.mark_connecting().await;
        match inner.ping().await {
            Ok(()) => {
                inner.tracker.mark_connected().await;
                info!(
                    binding = %inner.binding,
                    address = %inner.spec.address,
                    client_id = %inner.spec.client_id,
                    queue = %inner.spec.queue_name,
                    "connected to KubeMQ"
                );
                Inner::spawn_heartbeat(inner.clone()).await;
                Ok(())
            }
            Err(e) => {
                inner.tracker.mark_disconnected(Some(e.to_string())).await;
                error!(binding = %inner.binding, error = %e, "error connecting to KubeMQ server");
                Err(e)
            }
        }
    }

    async fn stop(&self) -> Result<(), EndpointError> {
        let inner = &self.inner;
        inner.stop.signal();

        let handles: Vec<JoinHandle<()>> = inner.tasks.lock().await.drain(..).collect();
        for handle in handles {
            let abort = handle.abort_handle();
            if tokio::time::timeout(STOP_TIMEOUT, handle).await.is_err() {
                warn!(binding = %inner.binding, "background task did not stop in time, aborting");
                abort.abort();
            }
        }

        // The gateway holds no session to release; disconnecting is a state
        // change only.
        inner.tracker.mark_disconnected(None).await;
        info!(binding = %inner.binding, "disconnected from KubeMQ");
        Ok(())
    }

    async fn poll(&self, sink: MessageSink) -> Result<(), EndpointError> {
        let inner = &self.inner;
        if !inner.tracker.is_connected().await {
            return Err(EndpointError::connection("not connected to KubeMQ"));
        }
        if inner.polling.swap(true, Ordering::AcqRel) {
            return Err(EndpointError::unknown("poller already running"));
        }

        let task_inner = inner.clone();
        let handle = tokio::spawn(async move {
            task_inner.run_poll_loop(sink).await;
        });
        inner.tasks.lock().await.push(handle);
        Ok(())
    }

    async fn send(&self, payload: &[u8]) -> Result<(), EndpointError> {
        let inner = &self.inner;
        if !inner.tracker.is_connected().await && !inner.try_reconnect().await {
            return Err(EndpointError::connection("not connected to KubeMQ"));
        }

        match inner.send_message(payload).await {
            Ok(()) => {
                inner.record_sent(payload);
                Ok(())
            }
            Err(e) if e.kind().breaks_connection() => {
                inner.tracker.metrics().record_send_error();
                inner.tracker.set_broken();
                inner.tracker.mark_disconnected(Some(e.to_string())).await;
                if inner.try_reconnect().await {
                    match inner.send_message(payload).await {
                        Ok(()) => {
                            inner.record_sent(payload);
                            Ok(())
                        }
                        Err(e2) => {
                            inner.tracker.metrics().record_send_error();
                            inner.tracker.record_error(e2.to_string()).await;
                            Err(e2)
                        }
                    }
                } else {
                    Err(e)
                }
            }
            Err(e) => {
                inner.tracker.metrics().record_send_error();
                inner.tracker.record_error(e.to_string()).await;
                error!(binding = %inner.binding, error = %e, "error sending message");
                Err(e)
            }
        }
    }

    async fn healthy(&self) -> bool {
        self.inner.tracker.is_connected().await
    }

    async fn probe_live(&self) -> bool {
        self.inner.ping().await.is_ok()
    }

    async fn health(&self) -> EndpointHealth {
        let inner = &self.inner;
        let started = Instant::now();
        let (status, latency_ms) = match inner.ping().await {
            Ok(()) => {
                let latency = started.elapsed().as_secs_f64() * 1000.0;
                inner.tracker.mark_connected().await;
                (HealthStatus::Healthy, Some((latency * 100.0).round() / 100.0))
            }
            Err(e) => {
                inner.tracker.mark_disconnected(Some(e.to_string())).await;
                (HealthStatus::Unhealthy, None)
            }
        };

        EndpointHealth {
            status,
            connection: inner.tracker.state().await,
            queue_name: inner.spec.queue_name.clone(),
            last_error: inner.tracker.last_error().await,
            latency_ms,
        }
    }

    fn queue_name(&self) -> &str {
        &self.inner.spec.queue_name
    }
}

impl Inner {
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .timeout(Duration::from_secs(30) + Duration::from_secs(self.spec.poll_interval_seconds));
        if let Some(token) = &self.spec.auth_token {
            builder = builder.header("Authorization", token);
        }
        builder
    }

    async fn ping(&self) -> Result<(), EndpointError> {
        let response = self
            .request(reqwest::Method::GET, "/ping")
            .send()
            .await
            .map_err(transport_error)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(classify::error_from_message(format!(
                "ping failed with status {}",
                response.status()
            )))
        }
    }

    async fn send_message(&self, payload: &[u8]) -> Result<(), EndpointError> {
        let message = QueueMessage {
            client_id: self.spec.client_id.clone(),
            channel: self.spec.queue_name.clone(),
            body: BASE64.encode(payload),
        };

        let response = self
            .request(reqwest::Method::POST, "/queue/send")
            .json(&message)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(classify::error_from_message(format!(
                "send failed with status {}",
                response.status()
            )));
        }

        let result: SendResult = response.json().await.map_err(transport_error)?;
        if result.is_error {
            return Err(classify::error_from_message(result.error));
        }
        Ok(())
    }

    /// Pull up to one message, waiting the configured broker-side interval.
    async fn receive_message(&self) -> Result<Option<Vec<u8>>, EndpointError> {
        let request = ReceiveRequest {
            client_id: self.spec.client_id.clone(),
            channel: self.spec.queue_name.clone(),
            max_messages: 1,
            wait_time_seconds: self.spec.poll_interval_seconds,
            is_peak: false,
        };

        let response = self
            .request(reqwest::Method::POST, "/queue/receive")
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(classify::error_from_message(format!(
                "receive failed with status {}",
                response.status()
            )));
        }

        let result: ReceiveResult = response.json().await.map_err(transport_error)?;
        if result.is_error {
            return Err(classify::error_from_message(result.error));
        }

        match result.messages.into_iter().next() {
            None => Ok(None),
            Some(message) => {
                let payload = BASE64.decode(message.body.as_bytes()).map_err(|e| {
                    EndpointError::permanent(format!("undecodable message body: {e}"))
                })?;
                Ok(Some(payload))
            }
        }
    }

    fn record_sent(&self, payload: &[u8]) {
        self.tracker.metrics().record_sent(payload.len());
        debug!(
            binding = %self.binding,
            queue = %self.spec.queue_name,
            bytes = payload.len(),
            "message sent to KubeMQ"
        );
    }

    // ── Poll loop ───────────────────────────────────────────────────

    async fn run_poll_loop(&self, sink: MessageSink) {
        info!(
            binding = %self.binding,
            queue = %self.spec.queue_name,
            "starting to poll for messages"
        );

        loop {
            if self.stop.is_set() {
                break;
            }

            if self.tracker.is_broken() || !self.tracker.is_connected().await {
                let attempt = self.tracker.next_reconnect_attempt();
                if self.reconnect.exhausted(attempt) {
                    error!(
                        binding = %self.binding,
                        attempts = attempt - 1,
                        "reconnect ceiling reached, stopping poller"
                    );
                    self.stop.signal();
                    continue;
                }
                if !self.try_reconnect().await {
                    self.stop.sleep(self.reconnect.delay()).await;
                }
                continue;
            }

            match self.receive_message().await {
                Ok(Some(payload)) => self.handle_message(payload, &sink).await,
                Ok(None) => self.stop.sleep(IDLE_DELAY).await,
                Err(e) => self.handle_poll_error(e).await,
            }
        }

        self.polling.store(false, Ordering::Release);
        info!(binding = %self.binding, queue = %self.spec.queue_name, "polling stopped");
    }

    async fn handle_message(&self, payload: Vec<u8>, sink: &MessageSink) {
        debug!(
            binding = %self.binding,
            queue = %self.spec.queue_name,
            bytes = payload.len(),
            "received message"
        );
        self.tracker.metrics().record_received(payload.len());

        match (sink)(payload.clone()).await {
            Ok(()) => {
                // The pull already removed the message; nothing to acknowledge.
            }
            Err(e) => {
                self.tracker.metrics().record_receive_error();
                self.tracker.record_error(e.to_string()).await;
                warn!(
                    binding = %self.binding,
                    error = %e,
                    "forwarding failed, re-enqueueing message for redelivery"
                );
                if let Err(requeue_err) = self.send_message(&payload).await {
                    error!(
                        binding = %self.binding,
                        error = %requeue_err,
                        "failed to re-enqueue message"
                    );
                    if requeue_err.kind().breaks_connection() {
                        self.tracker.set_broken();
                        self.tracker
                            .mark_disconnected(Some(requeue_err.to_string()))
                            .await;
                    }
                }
                self.stop.sleep(IDLE_DELAY).await;
            }
        }
    }

    async fn handle_poll_error(&self, e: EndpointError) {
        match e.kind() {
            ErrorKind::Transient => {
                debug!(binding = %self.binding, error = %e, "transient receive condition");
                self.stop.sleep(IDLE_DELAY).await;
            }
            ErrorKind::Connection | ErrorKind::Shutdown => {
                self.tracker.metrics().record_receive_error();
                self.tracker.set_broken();
                self.tracker.mark_disconnected(Some(e.to_string())).await;
                warn!(binding = %self.binding, error = %e, "connection lost while polling");
                self.stop.sleep(e.kind().recovery_delay()).await;
            }
            ErrorKind::Configuration | ErrorKind::Permanent | ErrorKind::Unknown => {
                self.tracker.metrics().record_receive_error();
                self.tracker.record_error(e.to_string()).await;
                error!(binding = %self.binding, error = %e, "error receiving message");
                self.stop.sleep(e.kind().recovery_delay()).await;
            }
        }
    }

    // ── Reconnection ────────────────────────────────────────────────

    async fn try_reconnect(&self) -> bool {
        self.tracker.mark_reconnecting().await;
        self.tracker.metrics().record_reconnect_attempt();
        info!(binding = %self.binding, address = %self.spec.address, "attempting reconnect to KubeMQ");
        match self.ping().await {
            Ok(()) => {
                self.tracker.mark_connected().await;
                info!(binding = %self.binding, "reconnected to KubeMQ");
                true
            }
            Err(e) => {
                self.tracker.metrics().record_reconnect_failure();
                self.tracker.mark_disconnected(Some(e.to_string())).await;
                warn!(binding = %self.binding, error = %e, "reconnect failed");
                false
            }
        }
    }

    // ── Heartbeat ───────────────────────────────────────────────────

    async fn spawn_heartbeat(inner: Arc<Inner>) {
        let task_inner = inner.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if task_inner.tracker.is_connected().await
                            && task_inner.ping().await.is_err()
                        {
                            warn!(
                                binding = %task_inner.binding,
                                "liveness probe failed, marking connection down"
                            );
                            task_inner.tracker.set_broken();
                            task_inner
                                .tracker
                                .mark_disconnected(Some("liveness probe failed".into()))
                                .await;
                        }
                    }
                    _ = task_inner.stop.wait() => break,
                }
            }
        });
        inner.tasks.lock().await.push(handle);
    }
}

fn transport_error(e: reqwest::Error) -> EndpointError {
    if e.is_connect() || e.is_timeout() {
        EndpointError::connection(format!("transport error: {e}"))
    } else {
        EndpointError::unknown(format!("transport error: {e}"))
    }
}
