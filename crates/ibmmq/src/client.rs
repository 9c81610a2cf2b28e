//! IBM MQ endpoint client over the messaging REST API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use bridge_core::{
    ConnectionTracker, Endpoint, EndpointError, EndpointHealth, ErrorKind, HealthStatus,
    IbmMqSpec, MessageSink, ReconnectPolicy, StopSignal,
};
use bridge_metrics::MetricsHelper;

use crate::reason;
use crate::strategies;

/// Any non-empty value satisfies the REST API's CSRF requirement.
const CSRF_TOKEN: &str = "mq-bridge";

/// Yield between iterations when the queue is idle.
const IDLE_DELAY: Duration = Duration::from_millis(100);

/// Liveness probe cadence.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// How long `stop` waits for background tasks before aborting them.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// IBM MQ queue client speaking the messaging REST API v2.
///
/// Cheap to clone; all state lives behind one shared inner.
#[derive(Clone)]
pub struct IbmMqClient {
    inner: Arc<Inner>,
}

struct Inner {
    binding: String,
    spec: IbmMqSpec,
    http: reqwest::Client,
    /// `{scheme}://host:port/ibmmq/rest/v2/messaging/qmgr/{qmgr}/queue/{queue}/message`
    message_url: String,
    tracker: ConnectionTracker,
    reconnect: ReconnectPolicy,
    stop: StopSignal,
    polling: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// One browsed message: payload plus the id needed to remove it later.
struct Browsed {
    payload: Vec<u8>,
    message_id: Option<String>,
}

impl IbmMqClient {
    pub fn new(
        binding: &str,
        spec: IbmMqSpec,
        metrics: Arc<MetricsHelper>,
    ) -> Result<Self, EndpointError> {
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(10));

        if spec.ssl {
            if let Some(path) = &spec.key_repo_location {
                let pem = std::fs::read(path).map_err(|e| {
                    EndpointError::configuration(format!(
                        "cannot read key repository '{path}': {e}"
                    ))
                })?;
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    EndpointError::configuration(format!(
                        "invalid certificate in key repository '{path}': {e}"
                    ))
                })?;
                builder = builder.add_root_certificate(cert);
            }
        }

        let http = builder
            .build()
            .map_err(|e| EndpointError::configuration(format!("http client: {e}")))?;

        let scheme = if spec.ssl { "https" } else { "http" };
        let message_url = format!(
            "{scheme}://{host}:{port}/ibmmq/rest/v2/messaging/qmgr/{qmgr}/queue/{queue}/message",
            host = spec.host_name,
            port = spec.port_number,
            qmgr = spec.queue_manager,
            queue = spec.queue_name,
        );

        let reconnect = ReconnectPolicy::new(spec.reconnect_delay, spec.max_reconnect_attempts);

        Ok(Self {
            inner: Arc::new(Inner {
                binding: binding.to_string(),
                spec,
                http,
                message_url,
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
impl Endpoint for IbmMqClient {
    async fn start(&self) -> Result<(), EndpointError> {
        let inner = &self.inner;
        inner.tracker.mark_connecting().await;
        match inner.open_session().await {
            Ok(()) => {
                inner.tracker.mark_connected().await;
                info!(
                    binding = %inner.binding,
                    qmgr = %inner.spec.queue_manager,
                    channel = %inner.spec.channel_name,
                    conn = %inner.spec.connection_name(),
                    queue = %inner.spec.queue_name,
                    "connected to IBM MQ"
                );
                Inner::spawn_heartbeat(inner.clone()).await;
                Ok(())
            }
            Err(e) => {
                inner.tracker.mark_disconnected(Some(e.to_string())).await;
                error!(binding = %inner.binding, error = %e, "error connecting to IBM MQ");
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

        inner.tracker.mark_disconnected(None).await;
        info!(binding = %inner.binding, "disconnected from IBM MQ");
        Ok(())
    }

    async fn poll(&self, sink: MessageSink) -> Result<(), EndpointError> {
        let inner = &self.inner;
        if !inner.tracker.is_connected().await {
            return Err(EndpointError::connection("not connected to IBM MQ"));
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
            return Err(EndpointError::connection("not connected to IBM MQ"));
        }

        match inner.put_message(payload).await {
            Ok(()) => {
                inner.record_sent(payload);
                Ok(())
            }
            Err(e) if e.kind().breaks_connection() => {
                inner.tracker.metrics().record_send_error();
                inner.tracker.set_broken();
                inner.tracker.mark_disconnected(Some(e.to_string())).await;
                // One reconnect, one more try.
                if inner.try_reconnect().await {
                    match inner.put_message(payload).await {
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
                error!(binding = %inner.binding, error = %e, "error sending message to IBM MQ");
                Err(e)
            }
        }
    }

    async fn healthy(&self) -> bool {
        self.inner.tracker.is_connected().await
    }

    async fn probe_live(&self) -> bool {
        self.inner.open_session().await.is_ok()
    }

    async fn health(&self) -> EndpointHealth {
        let inner = &self.inner;
        let started = Instant::now();
        let (status, latency_ms) = match inner.open_session().await {
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
    /// Minimal round trip: browse with no wait. 200 and 204 both prove the
    /// queue is reachable and we are authorized.
    async fn open_session(&self) -> Result<(), EndpointError> {
        let response = self
            .http
            .get(&self.message_url)
            .query(&[("wait", "0")])
            .basic_auth(&self.spec.username, self.spec.password.as_deref())
            .header("ibm-mq-rest-csrf-token", CSRF_TOKEN)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status => Err(classify_response(status, &response.text().await.unwrap_or_default())),
        }
    }

    /// Browse the front message, waiting up to `wait_ms` for one to arrive.
    async fn browse_message(&self, wait_ms: u64) -> Result<Option<Browsed>, EndpointError> {
        let response = self
            .http
            .get(&self.message_url)
            .query(&[("wait", wait_ms.to_string())])
            .basic_auth(&self.spec.username, self.spec.password.as_deref())
            .header("ibm-mq-rest-csrf-token", CSRF_TOKEN)
            .timeout(Duration::from_millis(wait_ms) + Duration::from_secs(30))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::OK => {
                let message_id = response
                    .headers()
                    .get("ibm-mq-md-messageId")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let payload = response.bytes().await.map_err(transport_error)?.to_vec();
                Ok(Some(Browsed {
                    payload,
                    message_id,
                }))
            }
            status => Err(classify_response(status, &response.text().await.unwrap_or_default())),
        }
    }

    /// Destructively get a previously browsed message: the acknowledgement.
    async fn delete_message(&self, message_id: &str) -> Result<(), EndpointError> {
        let response = self
            .http
            .delete(&self.message_url)
            .query(&[("messageId", message_id)])
            .basic_auth(&self.spec.username, self.spec.password.as_deref())
            .header("ibm-mq-rest-csrf-token", CSRF_TOKEN)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status => Err(classify_response(status, &response.text().await.unwrap_or_default())),
        }
    }

    async fn put_message(&self, payload: &[u8]) -> Result<(), EndpointError> {
        let content_type = strategies::content_type_for(
            self.spec.sender_mode,
            &self.spec.message_format,
            self.spec.message_ccsid,
        );
        let response = self
            .http
            .post(&self.message_url)
            .basic_auth(&self.spec.username, self.spec.password.as_deref())
            .header("ibm-mq-rest-csrf-token", CSRF_TOKEN)
            .header("Content-Type", content_type)
            .timeout(Duration::from_secs(30))
            .body(payload.to_vec())
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            status => Err(classify_response(status, &response.text().await.unwrap_or_default())),
        }
    }

    fn record_sent(&self, payload: &[u8]) {
        self.tracker.metrics().record_sent(payload.len());
        if self.spec.log_sent_messages {
            debug!(
                binding = %self.binding,
                queue = %self.spec.queue_name,
                payload = %String::from_utf8_lossy(payload),
                "sent message"
            );
        }
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

            match self.browse_message(self.spec.poll_interval_ms).await {
                Ok(Some(browsed)) => self.handle_message(browsed, &sink).await,
                Ok(None) => self.stop.sleep(IDLE_DELAY).await,
                Err(e) => self.handle_poll_error(e).await,
            }
        }

        self.polling.store(false, Ordering::Release);
        info!(binding = %self.binding, queue = %self.spec.queue_name, "polling stopped");
    }

    async fn handle_message(&self, browsed: Browsed, sink: &MessageSink) {
        let payload = strategies::normalize_received(self.spec.receiver_mode, browsed.payload);
        if self.spec.log_received_messages {
            debug!(
                binding = %self.binding,
                queue = %self.spec.queue_name,
                payload = %String::from_utf8_lossy(&payload),
                "received message"
            );
        }
        self.tracker.metrics().record_received(payload.len());

        match (sink)(payload).await {
            Ok(()) => match &browsed.message_id {
                Some(id) => {
                    if let Err(e) = self.delete_message(id).await {
                        self.tracker.metrics().record_receive_error();
                        warn!(binding = %self.binding, error = %e, "failed to remove delivered message");
                        if e.kind().breaks_connection() {
                            self.tracker.set_broken();
                            self.tracker.mark_disconnected(Some(e.to_string())).await;
                        }
                    }
                }
                None => {
                    warn!(binding = %self.binding, "delivered message carried no id, cannot remove it");
                }
            },
            Err(e) => {
                // Negative acknowledgement: the message stays on the queue
                // and is browsed again on the next iteration.
                self.tracker.metrics().record_receive_error();
                self.tracker.record_error(e.to_string()).await;
                warn!(
                    binding = %self.binding,
                    error = %e,
                    "forwarding failed, leaving message for redelivery"
                );
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
            ErrorKind::Connection => {
                self.tracker.metrics().record_receive_error();
                self.tracker.set_broken();
                self.tracker.mark_disconnected(Some(e.to_string())).await;
                warn!(binding = %self.binding, error = %e, "connection lost while polling");
            }
            ErrorKind::Shutdown => {
                self.tracker.metrics().record_receive_error();
                self.tracker.set_broken();
                self.tracker.mark_disconnected(Some(e.to_string())).await;
                warn!(binding = %self.binding, error = %e, "queue manager is quiescing");
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
        info!(
            binding = %self.binding,
            conn = %self.spec.connection_name(),
            "attempting reconnect to IBM MQ"
        );
        match self.open_session().await {
            Ok(()) => {
                self.tracker.mark_connected().await;
                info!(binding = %self.binding, "reconnected to IBM MQ");
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
                            && task_inner.open_session().await.is_err()
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

// ── Error mapping ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RestErrorBody {
    #[serde(default)]
    error: Vec<RestErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct RestErrorDetail {
    #[serde(rename = "reasonCode", default)]
    reason_code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

fn transport_error(e: reqwest::Error) -> EndpointError {
    if e.is_connect() || e.is_timeout() {
        EndpointError::connection(format!("transport error: {e}"))
    } else {
        EndpointError::unknown(format!("transport error: {e}"))
    }
}

/// Map a non-success REST response into the error taxonomy. The MQRC
/// reason code from the body wins; the HTTP status is the fallback.
fn classify_response(status: StatusCode, body: &str) -> EndpointError {
    if let Ok(parsed) = serde_json::from_str::<RestErrorBody>(body) {
        if let Some(detail) = parsed.error.first() {
            if let Some(code) = detail.reason_code {
                let message = detail
                    .message
                    .clone()
                    .unwrap_or_else(|| reason::describe(code));
                return EndpointError::new(reason::classify(code), message);
            }
        }
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            EndpointError::configuration(format!("not authorized ({status})"))
        }
        StatusCode::NOT_FOUND => {
            EndpointError::configuration(format!("unknown queue manager or queue ({status})"))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            EndpointError::transient(format!("broker busy ({status})"))
        }
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            EndpointError::connection(format!("queue manager unavailable ({status})"))
        }
        status => EndpointError::unknown(format!("unexpected response ({status}): {body}")),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use bridge_metrics::{MetricLabels, MetricsService, Role};

    use super::*;

    const MESSAGE_PATH: &str = "/ibmmq/rest/v2/messaging/qmgr/QM1/queue/ORDERS.IN/message";

    fn spec_for(server: &MockServer) -> IbmMqSpec {
        let addr = server.address();
        IbmMqSpec {
            host_name: addr.ip().to_string(),
            port_number: addr.port(),
            queue_manager: "QM1".into(),
            channel_name: "DEV.APP.SVRCONN".into(),
            queue_name: "ORDERS.IN".into(),
            username: "app".into(),
            password: Some("passw0rd".into()),
            message_ccsid: 1208,
            message_format: String::new(),
            receiver_mode: Default::default(),
            sender_mode: Default::default(),
            log_received_messages: false,
            log_sent_messages: false,
            poll_interval_ms: 50,
            ssl: false,
            ssl_cipher_spec: None,
            key_repo_location: None,
            reconnect_delay: 0.05,
            max_reconnect_attempts: 0,
        }
    }

    fn client_for(server: &MockServer) -> IbmMqClient {
        let service = Arc::new(MetricsService::new().unwrap());
        let helper = service.helper(MetricLabels {
            binding_name: "b1".into(),
            binding_type: "ibm_mq".into(),
            role: Role::Source,
            queue_name: "ORDERS.IN".into(),
        });
        IbmMqClient::new("b1", spec_for(server), helper).unwrap()
    }

    #[tokio::test]
    async fn start_connects_on_empty_queue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MESSAGE_PATH))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.start().await.unwrap();
        assert!(client.healthy().await);

        client.stop().await.unwrap();
        assert!(!client.healthy().await);
    }

    #[tokio::test]
    async fn start_failure_is_classified_and_leaves_disconnected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MESSAGE_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!client.healthy().await);

        let health = client.health().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert!(health.last_error.is_some());
    }

    #[tokio::test]
    async fn reason_code_in_body_wins_over_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MESSAGE_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string(
                r#"{"error":[{"completionCode":2,"reasonCode":2085,"message":"MQRC_UNKNOWN_OBJECT_NAME"}]}"#,
            ))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().contains("MQRC_UNKNOWN_OBJECT_NAME"));
    }

    #[tokio::test]
    async fn send_puts_and_counts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MESSAGE_PATH))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(MESSAGE_PATH))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.start().await.unwrap();
        client.send(b"hello").await.unwrap();

        let snap = client.tracker().metrics().snapshot();
        assert_eq!(snap.messages_sent_total, 1);
        assert_eq!(snap.messages_sent_volume, 5);
        assert_eq!(snap.errors_sent_total, 0);

        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn failed_send_records_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MESSAGE_PATH))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(MESSAGE_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string(
                r#"{"error":[{"completionCode":2,"reasonCode":2053,"message":"queue full"}]}"#,
            ))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.start().await.unwrap();

        let err = client.send(b"hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);

        let snap = client.tracker().metrics().snapshot();
        assert_eq!(snap.messages_sent_total, 0);
        assert_eq!(snap.errors_sent_total, 1);

        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn poll_browses_forwards_and_acks() {
        let server = MockServer::start().await;
        // The start/heartbeat probes browse with wait=0; only the poll
        // loop's browse (wait=50) may consume the one-shot message.
        Mock::given(method("GET"))
            .and(path(MESSAGE_PATH))
            .and(query_param("wait", "50"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ibm-mq-md-messageId", "414D51204D657373616765")
                    .set_body_bytes(b"hello".to_vec()),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(MESSAGE_PATH))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(MESSAGE_PATH))
            .and(query_param("messageId", "414D51204D657373616765"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.start().await.unwrap();

        let seen: Arc<StdMutex<Vec<Vec<u8>>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: MessageSink = Arc::new(move |payload| {
            let sink_seen = sink_seen.clone();
            Box::pin(async move {
                sink_seen.lock().unwrap().push(payload);
                Ok(())
            })
        });

        client.poll(sink).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        client.stop().await.unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), &[b"hello".to_vec()]);
        let snap = client.tracker().metrics().snapshot();
        assert_eq!(snap.messages_received_total, 1);
        assert_eq!(snap.messages_received_volume, 5);
    }

    #[tokio::test]
    async fn second_poller_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MESSAGE_PATH))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.start().await.unwrap();

        let sink: MessageSink = Arc::new(|_| Box::pin(async { Ok(()) }));
        client.poll(sink.clone()).await.unwrap();
        assert!(client.poll(sink).await.is_err());

        client.stop().await.unwrap();
    }

    #[test]
    fn status_fallback_classification() {
        assert_eq!(
            classify_response(StatusCode::UNAUTHORIZED, "").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            classify_response(StatusCode::SERVICE_UNAVAILABLE, "").kind(),
            ErrorKind::Connection
        );
        assert_eq!(
            classify_response(StatusCode::TOO_MANY_REQUESTS, "").kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            classify_response(StatusCode::INTERNAL_SERVER_ERROR, "boom").kind(),
            ErrorKind::Unknown
        );
    }
}
