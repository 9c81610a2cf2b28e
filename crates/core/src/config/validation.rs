use std::collections::HashSet;

use super::types::{BridgeConfig, IbmMqSpec, KubeMqSpec, RetryConfig, RouteSpec};
use crate::error::ConfigError;

impl BridgeConfig {
    /// Validate the binding set: names, endpoint specs, retry bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bindings.is_empty() {
            return Err(ConfigError::Invalid("no bindings declared".into()));
        }

        let mut seen = HashSet::new();
        for binding in &self.bindings {
            if binding.name.trim().is_empty() {
                return Err(ConfigError::Invalid("binding with empty name".into()));
            }
            if !seen.insert(binding.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate binding name '{}'",
                    binding.name
                )));
            }

            validate_retry(&binding.name, &binding.retry)?;
            match &binding.route {
                RouteSpec::IbmMqToKubemq { source, target } => {
                    validate_ibmmq(&binding.name, "source", source)?;
                    validate_kubemq(&binding.name, "target", target)?;
                }
                RouteSpec::KubemqToIbmMq { source, target } => {
                    validate_kubemq(&binding.name, "source", source)?;
                    validate_ibmmq(&binding.name, "target", target)?;
                }
                RouteSpec::KubemqToKubemq { source, target } => {
                    validate_kubemq(&binding.name, "source", source)?;
                    validate_kubemq(&binding.name, "target", target)?;
                }
            }
        }
        Ok(())
    }
}

fn invalid(binding: &str, side: &str, what: &str) -> ConfigError {
    ConfigError::Invalid(format!("binding '{binding}' {side}: {what}"))
}

fn validate_retry(binding: &str, retry: &RetryConfig) -> Result<(), ConfigError> {
    if !retry.disable_retry && retry.max_retries < 1 {
        return Err(ConfigError::Invalid(format!(
            "binding '{binding}': max_retries must be at least 1"
        )));
    }
    if retry.delay_seconds < 0.0 {
        return Err(ConfigError::Invalid(format!(
            "binding '{binding}': delay_seconds must not be negative"
        )));
    }
    Ok(())
}

fn validate_ibmmq(binding: &str, side: &str, spec: &IbmMqSpec) -> Result<(), ConfigError> {
    if spec.queue_name.trim().is_empty() {
        return Err(invalid(binding, side, "queue_name must not be empty"));
    }
    if spec.host_name.trim().is_empty() {
        return Err(invalid(binding, side, "host_name must not be empty"));
    }
    if spec.queue_manager.trim().is_empty() {
        return Err(invalid(binding, side, "queue_manager must not be empty"));
    }
    if spec.channel_name.trim().is_empty() {
        return Err(invalid(binding, side, "channel_name must not be empty"));
    }
    if spec.port_number == 0 {
        return Err(invalid(binding, side, "port_number must be in 1..=65535"));
    }
    if spec.poll_interval_ms == 0 {
        return Err(invalid(binding, side, "poll_interval_ms must be at least 1"));
    }
    if spec.reconnect_delay < 0.0 {
        return Err(invalid(binding, side, "reconnect_delay must not be negative"));
    }
    if spec.ssl {
        if spec.ssl_cipher_spec.as_deref().unwrap_or("").is_empty() {
            return Err(invalid(
                binding,
                side,
                "ssl_cipher_spec is required when ssl is true",
            ));
        }
        if spec.key_repo_location.as_deref().unwrap_or("").is_empty() {
            return Err(invalid(
                binding,
                side,
                "key_repo_location is required when ssl is true",
            ));
        }
    }
    Ok(())
}

fn validate_kubemq(binding: &str, side: &str, spec: &KubeMqSpec) -> Result<(), ConfigError> {
    if spec.queue_name.trim().is_empty() {
        return Err(invalid(binding, side, "queue_name must not be empty"));
    }
    if spec.address.trim().is_empty() {
        return Err(invalid(binding, side, "address must not be empty"));
    }
    if spec.poll_interval_seconds == 0 {
        return Err(invalid(
            binding,
            side,
            "poll_interval_seconds must be at least 1",
        ));
    }
    if spec.reconnect_delay < 0.0 {
        return Err(invalid(binding, side, "reconnect_delay must not be negative"));
    }
    Ok(())
}
