use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bridge_core::{config, BridgeConfig, DaemonSettings};
use bridge_daemon::{api, Supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    let settings = DaemonSettings::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = BridgeConfig::from_file(&settings.config_path).with_context(|| {
        format!(
            "failed to load bindings config from {}",
            settings.config_path.display()
        )
    })?;
    info!(
        config = %settings.config_path.display(),
        bindings = config.bindings.len(),
        "configuration loaded"
    );

    let supervisor = Arc::new(Supervisor::init(config).context("failed to initialize bindings")?);

    // Bind the API port before starting any binding so a port clash fails
    // the process instead of leaving half a daemon running.
    let addr = format!("{}:{}", settings.api_host, settings.api_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API address {addr}"))?;
    info!(%addr, "API server listening");

    supervisor.start().await;

    let app = api::router(supervisor.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")?;

    info!("shutdown signal received, stopping bindings");
    supervisor.stop().await;
    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C (cross-platform fallback).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl_c");
    }
}
