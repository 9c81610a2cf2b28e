//! KubeMQ adapter for the bridge daemon.
//!
//! Talks to the KubeMQ queues REST gateway. Receives are destructive pulls,
//! so acknowledgement is implicit and a negative acknowledgement re-enqueues
//! the payload to keep it redeliverable.

pub mod classify;
pub mod client;

pub use client::KubeMqClient;
