//! Error taxonomy shared by the bridge engine and the broker adapters.
//!
//! Adapters classify raw broker failures once at the boundary into an
//! [`ErrorKind`]; the poll loops and the retry wrapper react to the kind,
//! never to raw status or reason codes.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Fatal configuration problems. Only raised at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Recovery classification for a runtime endpoint failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Temporary broker-side condition; retried in place after a short wait.
    Transient,
    /// Session lost mid-operation; requires reconnect.
    Connection,
    /// Remote is quiescing or stopping; reconnect after a longer wait.
    Shutdown,
    /// Not authorized, unknown object, type mismatch. Never retried.
    Configuration,
    /// Requires intervention; not retried.
    Permanent,
    /// Anything unclassified.
    Unknown,
}

impl ErrorKind {
    /// Whether the poll loop must tear the session down and reconnect.
    pub fn breaks_connection(&self) -> bool {
        matches!(self, ErrorKind::Connection | ErrorKind::Shutdown)
    }

    /// How long the poll loop waits before its next iteration.
    pub fn recovery_delay(&self) -> Duration {
        match self {
            ErrorKind::Transient => Duration::from_millis(100),
            ErrorKind::Connection => Duration::ZERO,
            ErrorKind::Shutdown => Duration::from_secs(5),
            ErrorKind::Configuration | ErrorKind::Permanent | ErrorKind::Unknown => {
                Duration::from_secs(1)
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Connection => "connection",
            ErrorKind::Shutdown => "shutdown",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Permanent => "permanent",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// A classified endpoint failure.
#[derive(Debug, Clone, Error)]
#[error("{message} (type: {kind})")]
pub struct EndpointError {
    kind: ErrorKind,
    message: String,
}

impl EndpointError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Shutdown, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
