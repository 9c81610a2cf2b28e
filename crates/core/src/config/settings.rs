use std::env;
use std::path::PathBuf;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Daemon-level settings read from the environment.
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    /// Path to the bindings YAML file (`CONFIG_PATH`).
    pub config_path: PathBuf,
    /// Log filter directive (`LOG_LEVEL`).
    pub log_level: String,
    /// Bind address for the HTTP API (`API_HOST`).
    pub api_host: String,
    /// Bind port for the HTTP API (`API_PORT`).
    pub api_port: u16,
}

impl DaemonSettings {
    /// Build settings from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            config_path: PathBuf::from(env_or("CONFIG_PATH", "config.yaml")),
            log_level: env_or("LOG_LEVEL", "info").to_lowercase(),
            api_host: env_or("API_HOST", "0.0.0.0"),
            api_port: env_or("API_PORT", "9000").parse().unwrap_or(9000),
        }
    }
}
