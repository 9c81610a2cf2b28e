pub mod config;
pub mod endpoint;
pub mod error;
pub mod reconnect;
pub mod retry;
pub mod state;

pub use config::{
    BindingConfig, BridgeConfig, DaemonSettings, IbmMqSpec, KubeMqSpec, ReceiverMode,
    RetryConfig, RouteSpec, SenderMode,
};
pub use endpoint::{Endpoint, EndpointHealth, HealthStatus, MessageSink, SinkFuture};
pub use error::{ConfigError, EndpointError, ErrorKind};
pub use reconnect::ReconnectPolicy;
pub use retry::RetryPolicy;
pub use state::{ConnectionState, ConnectionTracker, StopSignal};
