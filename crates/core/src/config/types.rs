use serde::{Deserialize, Serialize};

// ── Top-level config ────────────────────────────────────────────────

/// Full configuration: the declared set of bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

/// One named, unidirectional source → target pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Unique name of the binding.
    pub name: String,

    /// Direction tag plus the matching pair of endpoint specs.
    #[serde(flatten)]
    pub route: RouteSpec,

    /// Retry policy applied around target sends.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// The direction tag constrains which endpoint spec variant sits on each
/// side, so a mismatched pair cannot be expressed at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteSpec {
    IbmMqToKubemq {
        source: IbmMqSpec,
        target: KubeMqSpec,
    },
    KubemqToIbmMq {
        source: KubeMqSpec,
        target: IbmMqSpec,
    },
    KubemqToKubemq {
        source: KubeMqSpec,
        target: KubeMqSpec,
    },
}

impl RouteSpec {
    /// The direction tag as written in the config file.
    pub fn kind(&self) -> &'static str {
        match self {
            RouteSpec::IbmMqToKubemq { .. } => "ibm_mq_to_kubemq",
            RouteSpec::KubemqToIbmMq { .. } => "kubemq_to_ibm_mq",
            RouteSpec::KubemqToKubemq { .. } => "kubemq_to_kubemq",
        }
    }

    pub fn source_queue(&self) -> &str {
        match self {
            RouteSpec::IbmMqToKubemq { source, .. } => &source.queue_name,
            RouteSpec::KubemqToIbmMq { source, .. } => &source.queue_name,
            RouteSpec::KubemqToKubemq { source, .. } => &source.queue_name,
        }
    }

    pub fn target_queue(&self) -> &str {
        match self {
            RouteSpec::IbmMqToKubemq { target, .. } => &target.queue_name,
            RouteSpec::KubemqToIbmMq { target, .. } => &target.queue_name,
            RouteSpec::KubemqToKubemq { target, .. } => &target.queue_name,
        }
    }
}

// ── Retry ───────────────────────────────────────────────────────────

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// When true, target sends are attempted exactly once.
    #[serde(default)]
    pub disable_retry: bool,

    /// Total number of attempts (not additional retries).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts, in seconds.
    #[serde(default = "default_retry_delay")]
    pub delay_seconds: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> f64 {
    1.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            disable_retry: false,
            max_retries: default_max_retries(),
            delay_seconds: default_retry_delay(),
        }
    }
}

// ── IBM MQ endpoint spec ────────────────────────────────────────────

/// Message receiving mode for the IBM MQ side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverMode {
    #[default]
    Default,
    /// Keep RFH2 headers on received payloads.
    Rfh2,
    /// Strip any framing before the payload proper.
    NoRfh2,
}

/// Message sending mode for the IBM MQ side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderMode {
    #[default]
    Default,
    Rfh2,
    /// Honor `message_format` and `message_ccsid`.
    Custom,
}

/// Connection parameters for an IBM MQ queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IbmMqSpec {
    pub host_name: String,
    pub port_number: u16,
    pub queue_manager: String,
    pub channel_name: String,
    pub queue_name: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_ccsid")]
    pub message_ccsid: i32,
    #[serde(default)]
    pub message_format: String,
    #[serde(default)]
    pub receiver_mode: ReceiverMode,
    #[serde(default)]
    pub sender_mode: SenderMode,

    #[serde(default)]
    pub log_received_messages: bool,
    #[serde(default)]
    pub log_sent_messages: bool,

    /// Broker wait per get, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub ssl_cipher_spec: Option<String>,
    #[serde(default)]
    pub key_repo_location: Option<String>,

    /// Fixed delay between reconnect attempts, in seconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: f64,
    /// Ceiling on consecutive reconnect attempts; 0 means unbounded.
    #[serde(default)]
    pub max_reconnect_attempts: u32,
}

impl IbmMqSpec {
    /// Connection name in MQ notation, `host(port)`.
    pub fn connection_name(&self) -> String {
        format!("{}({})", self.host_name, self.port_number)
    }
}

fn default_ccsid() -> i32 {
    1208
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_reconnect_delay() -> f64 {
    5.0
}

// ── KubeMQ endpoint spec ────────────────────────────────────────────

/// Connection parameters for a KubeMQ queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeMqSpec {
    /// `host:port` of the KubeMQ gateway.
    pub address: String,
    pub queue_name: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub tls_cert_file: Option<String>,
    #[serde(default)]
    pub tls_key_file: Option<String>,
    #[serde(default)]
    pub tls_ca_file: Option<String>,

    /// Broker wait per receive, in seconds.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    /// Fixed delay between reconnect attempts, in seconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: f64,
    /// Ceiling on consecutive reconnect attempts; 0 means unbounded.
    #[serde(default)]
    pub max_reconnect_attempts: u32,
}

fn default_client_id() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "mq-bridge".to_string())
}

fn default_poll_interval_seconds() -> u64 {
    1
}
