//! Publish endpoint used by mutation handlers after committing a change.

use super::AppState;
use crate::error::ApiError;
use crate::state::{ConnectionId, StoreEvent};
use crate::telemetry::spans;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Serialize;

/// Header naming the connection that originated a change; it is skipped.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub delivered: usize,
}

/// POST /api/stores/:store_id/events
pub async fn publish(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    headers: HeaderMap,
    Json(event): Json<StoreEvent>,
) -> Result<(StatusCode, Json<PublishResponse>), ApiError> {
    if !event.is_publishable() {
        return Err(ApiError::ReservedEventType);
    }

    let origin = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(ConnectionId::from);

    let span = spans::publish(&store_id, event.kind(), origin.as_ref().map(ConnectionId::as_str));
    let delivered = span.in_scope(|| state.registry.broadcast(&store_id, &event, origin.as_ref()));

    Ok((StatusCode::ACCEPTED, Json(PublishResponse { delivered })))
}
