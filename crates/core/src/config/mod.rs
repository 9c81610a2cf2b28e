//! Configuration model for the bridge daemon.
//!
//! The binding set is declared in a YAML file (see `config.example.yaml` at
//! the repository root); daemon-level settings come from environment
//! variables.

mod loading;
mod settings;
mod types;
mod validation;


pub use settings::{load_dotenv, DaemonSettings};
pub use types::{
    BindingConfig, BridgeConfig, IbmMqSpec, KubeMqSpec, ReceiverMode, RetryConfig, RouteSpec,
    SenderMode,
};
