//! HTTP surface of the push service.
//!
//! - `GET  /api/stores/:store_id/events` opens an event stream
//! - `POST /api/stores/:store_id/events` broadcasts an event to a store
//! - `GET  /api/stores/:store_id/connections[/count]` lists open streams
//! - `GET  /health`
//!
//! Prometheus metrics are served by a separate listener.

mod events;
mod publish;
mod stores;

use crate::config::Config;
use crate::state::ConnectionRegistry;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    /// Frames buffered per stream.
    pub channel_capacity: usize,
    pub name: Arc<str>,
}

impl AppState {
    pub fn new(registry: Arc<ConnectionRegistry>, config: &Config) -> Self {
        Self {
            registry,
            channel_capacity: config.limits.channel_capacity,
            name: Arc::from(config.server.name.as_str()),
        }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/stores/:store_id/events",
            get(events::subscribe).post(publish::publish),
        )
        .route(
            "/api/stores/:store_id/connections",
            get(stores::list_connections),
        )
        .route(
            "/api/stores/:store_id/connections/count",
            get(stores::count_connections),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    name: String,
    connections: usize,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        name: state.name.to_string(),
        connections: state.registry.len(),
    })
}

/// Run the API server until it fails.
pub async fn run_api_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind API server on {}: {}", addr, e);
        e
    })?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Run the HTTP server for Prometheus metrics.
///
/// Binds to `0.0.0.0:port` and serves the `/metrics` endpoint.
/// This is a long-running task that should be spawned in the background.
pub async fn run_metrics_server(port: u16) {
    let app = Router::new().route("/metrics", get(metrics_handler));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Prometheus HTTP server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind metrics server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Metrics server error: {}", e);
    }
}
