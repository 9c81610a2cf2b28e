//! Classification of IBM MQ reason codes.
//!
//! The REST API reports the underlying MQRC reason code in its error body;
//! this module maps those codes into the shared error taxonomy so the poll
//! loop and retry wrapper never see raw codes.

use bridge_core::ErrorKind;

// Transient: temporary broker-side conditions.
pub const MQRC_NO_MSG_AVAILABLE: i64 = 2033;
pub const MQRC_BACKED_OUT: i64 = 2003;
pub const MQRC_Q_FULL: i64 = 2053;
pub const MQRC_STORAGE_NOT_AVAILABLE: i64 = 2071;
pub const MQRC_RESOURCE_PROBLEM: i64 = 2102;
pub const MQRC_PAGESET_ERROR: i64 = 2193;

// Connection: the session to the queue manager is unusable.
pub const MQRC_CONNECTION_BROKEN: i64 = 2009;
pub const MQRC_Q_MGR_NOT_AVAILABLE: i64 = 2059;
pub const MQRC_Q_MGR_QUIESCING: i64 = 2161;
pub const MQRC_Q_MGR_STOPPING: i64 = 2162;
pub const MQRC_CONNECTION_ERROR: i64 = 2273;
pub const MQRC_CHANNEL_NOT_AVAILABLE: i64 = 2537;
pub const MQRC_HOST_NOT_AVAILABLE: i64 = 2538;

// Configuration: wrong names, permissions, TLS setup.
pub const MQRC_NOT_AUTHORIZED: i64 = 2035;
pub const MQRC_Q_TYPE_ERROR: i64 = 2057;
pub const MQRC_UNKNOWN_OBJECT_NAME: i64 = 2085;
pub const MQRC_UNKNOWN_REMOTE_Q_MGR: i64 = 2087;
pub const MQRC_SSL_CONFIG_ERROR: i64 = 2393;
pub const MQRC_UNKNOWN_CHANNEL_NAME: i64 = 2540;

// Shutdown: remote is quiescing this connection.
pub const MQRC_CONNECTION_QUIESCING: i64 = 2202;

const TRANSIENT: &[i64] = &[
    MQRC_NO_MSG_AVAILABLE,
    MQRC_BACKED_OUT,
    MQRC_Q_FULL,
    MQRC_STORAGE_NOT_AVAILABLE,
    MQRC_RESOURCE_PROBLEM,
    MQRC_PAGESET_ERROR,
];

const CONNECTION: &[i64] = &[
    MQRC_CONNECTION_BROKEN,
    MQRC_Q_MGR_NOT_AVAILABLE,
    MQRC_Q_MGR_QUIESCING,
    MQRC_Q_MGR_STOPPING,
    MQRC_CONNECTION_ERROR,
    MQRC_CHANNEL_NOT_AVAILABLE,
    MQRC_HOST_NOT_AVAILABLE,
];

const CONFIGURATION: &[i64] = &[
    MQRC_NOT_AUTHORIZED,
    MQRC_Q_TYPE_ERROR,
    MQRC_UNKNOWN_OBJECT_NAME,
    MQRC_UNKNOWN_REMOTE_Q_MGR,
    MQRC_SSL_CONFIG_ERROR,
    MQRC_UNKNOWN_CHANNEL_NAME,
];

const SHUTDOWN: &[i64] = &[MQRC_CONNECTION_QUIESCING];

/// Classify an MQRC reason code. Anything unrecognized is permanent.
pub fn classify(reason: i64) -> ErrorKind {
    if TRANSIENT.contains(&reason) {
        ErrorKind::Transient
    } else if CONNECTION.contains(&reason) {
        ErrorKind::Connection
    } else if CONFIGURATION.contains(&reason) {
        ErrorKind::Configuration
    } else if SHUTDOWN.contains(&reason) {
        ErrorKind::Shutdown
    } else {
        ErrorKind::Permanent
    }
}

/// Human-readable description of a reason code.
pub fn describe(reason: i64) -> String {
    let text = match reason {
        MQRC_NO_MSG_AVAILABLE => "no message available on the queue",
        MQRC_Q_FULL => "queue is full, cannot put message",
        MQRC_RESOURCE_PROBLEM => "temporary resource constraint",
        MQRC_BACKED_OUT => "message was backed out",
        MQRC_CONNECTION_BROKEN => "connection to the queue manager was lost",
        MQRC_CONNECTION_ERROR => "error establishing connection",
        MQRC_Q_MGR_NOT_AVAILABLE => "queue manager is not available",
        MQRC_HOST_NOT_AVAILABLE => "host is not available",
        MQRC_UNKNOWN_OBJECT_NAME => "queue name not found or incorrect",
        MQRC_NOT_AUTHORIZED => "not authorized to access the requested resource",
        MQRC_SSL_CONFIG_ERROR => "SSL configuration error",
        MQRC_Q_MGR_QUIESCING => "queue manager is quiescing",
        MQRC_Q_MGR_STOPPING => "queue manager is stopping",
        MQRC_CONNECTION_QUIESCING => "connection is quiescing",
        _ => return format!("IBM MQ error with reason code {reason}"),
    };
    format!("{text} (MQRC {reason})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes() {
        assert_eq!(classify(MQRC_NO_MSG_AVAILABLE), ErrorKind::Transient);
        assert_eq!(classify(MQRC_Q_FULL), ErrorKind::Transient);
        assert_eq!(classify(MQRC_BACKED_OUT), ErrorKind::Transient);
    }

    #[test]
    fn connection_codes() {
        assert_eq!(classify(MQRC_CONNECTION_BROKEN), ErrorKind::Connection);
        assert_eq!(classify(MQRC_HOST_NOT_AVAILABLE), ErrorKind::Connection);
        // Quiescing sits in both camps; the connection set wins, matching
        // the poll loop's need to tear the session down first.
        assert_eq!(classify(MQRC_Q_MGR_QUIESCING), ErrorKind::Connection);
    }

    #[test]
    fn configuration_codes() {
        assert_eq!(classify(MQRC_UNKNOWN_OBJECT_NAME), ErrorKind::Configuration);
        assert_eq!(classify(MQRC_NOT_AUTHORIZED), ErrorKind::Configuration);
        assert_eq!(classify(MQRC_SSL_CONFIG_ERROR), ErrorKind::Configuration);
    }

    #[test]
    fn shutdown_and_unknown_codes() {
        assert_eq!(classify(MQRC_CONNECTION_QUIESCING), ErrorKind::Shutdown);
        assert_eq!(classify(99999), ErrorKind::Permanent);
    }

    #[test]
    fn describe_falls_back_to_code() {
        assert!(describe(MQRC_Q_FULL).contains("2053"));
        assert!(describe(4242).contains("4242"));
    }
}
