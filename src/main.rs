//! esl-pushd - per-store push notifications for smart label deployments
//!
//! Holds one event stream per open browser tab and fans change events out to
//! every tab of the store they concern.

mod config;
mod error;
mod http;
mod metrics;
mod state;
mod telemetry;

use crate::config::Config;
use crate::http::AppState;
use crate::state::ConnectionRegistry;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(path = %config_path, error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {}",
            errors.len(),
            config_path
        ));
    }

    info!(
        name = %config.server.name,
        address = %config.listen.address,
        max_connections = config.limits.max_connections,
        max_connections_per_store = config.limits.max_connections_per_store,
        "Starting esl-pushd"
    );

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    match config.server.effective_metrics_port() {
        Some(port) => {
            metrics::init();
            tokio::spawn(async move {
                http::run_metrics_server(port).await;
            });
            info!(port, "Prometheus HTTP server started");
        }
        None => info!("Metrics disabled"),
    }

    let registry = Arc::new(ConnectionRegistry::from_config(&config.limits));
    let state = AppState::new(registry, &config);

    tokio::select! {
        result = http::run_api_server(config.listen.address, state) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    Ok(())
}
