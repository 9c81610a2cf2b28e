//! IBM MQ adapter for the bridge daemon.
//!
//! Talks to the queue manager through the IBM MQ messaging REST API v2.
//! Receives use browse-then-delete so a message is only removed from the
//! queue once the binding's sink has accepted it.

pub mod client;
pub mod reason;
pub mod strategies;

pub use client::IbmMqClient;
