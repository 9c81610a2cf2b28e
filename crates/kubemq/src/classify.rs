//! Error classification for KubeMQ operations.
//!
//! The gateway reports failures as free-form strings, so classification
//! works on the message text.

use bridge_core::{EndpointError, ErrorKind};

const CONNECTION_TERMS: &[&str] = &["connection", "connect", "network", "unreachable"];
const TRANSIENT_TERMS: &[&str] = &["timeout", "unavailable", "temporary", "overload"];
const CONFIGURATION_TERMS: &[&str] = &["config", "invalid", "permission", "auth"];

/// Classify a KubeMQ error message. Defaults to permanent.
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();

    if CONNECTION_TERMS.iter().any(|t| lower.contains(t)) {
        ErrorKind::Connection
    } else if TRANSIENT_TERMS.iter().any(|t| lower.contains(t)) {
        ErrorKind::Transient
    } else if CONFIGURATION_TERMS.iter().any(|t| lower.contains(t)) {
        ErrorKind::Configuration
    } else {
        ErrorKind::Permanent
    }
}

/// Build a classified error from a gateway message.
pub fn error_from_message(message: impl Into<String>) -> EndpointError {
    let message = message.into();
    EndpointError::new(classify_message(&message), message)
}
