//! Per-store connection listing.

use super::AppState;
use crate::state::ConnectionInfo;
use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConnections {
    pub store_id: String,
    pub count: usize,
    pub connections: Vec<ConnectionInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCount {
    pub store_id: String,
    pub count: usize,
}

/// GET /api/stores/:store_id/connections
pub async fn list_connections(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> Json<StoreConnections> {
    let connections = state.registry.connections_for_store(&store_id);
    Json(StoreConnections {
        store_id,
        count: connections.len(),
        connections,
    })
}

/// GET /api/stores/:store_id/connections/count
pub async fn count_connections(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> Json<StoreCount> {
    let count = state.registry.count_for_store(&store_id);
    Json(StoreCount { store_id, count })
}
