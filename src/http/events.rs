//! Event stream endpoint.

use super::AppState;
use crate::error::ApiError;
use crate::state::{ChannelSink, Connection, ConnectionId, ConnectionRegistry, RegistrationToken};
use crate::telemetry::spans;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use futures_util::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::Span;

/// Query parameters of a stream request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeParams {
    pub user_id: String,
    pub user_name: Option<String>,
    /// Caller-chosen connection id, generated when absent.
    pub client_id: Option<String>,
}

/// GET /api/stores/:store_id/events
///
/// Registers a connection and streams its frames until the client goes away
/// or the registry drops it.
pub async fn subscribe(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Query(params): Query<SubscribeParams>,
) -> Result<Response, ApiError> {
    let client_id = params
        .client_id
        .filter(|id| !id.is_empty())
        .map(ConnectionId::from)
        .unwrap_or_else(ConnectionId::generate);

    let span = spans::stream(client_id.as_str(), &store_id, &params.user_id);
    let (sink, rx) = ChannelSink::new(state.channel_capacity);
    let connection = Connection::new(
        client_id.clone(),
        store_id,
        params.user_id,
        params.user_name,
        sink,
    );
    let token = state.registry.try_register(connection)?;
    span.in_scope(|| tracing::debug!("Event stream opened"));

    let stream = EventStream {
        rx,
        _guard: StreamGuard {
            registry: Arc::clone(&state.registry),
            id: client_id,
            token,
            span,
        },
    };

    axum::http::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Unregisters the connection when the response body is dropped.
///
/// Removal is keyed on the registration token, so a guard outliving its
/// registration leaves a reconnected stream with the same id alone.
struct StreamGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
    token: RegistrationToken,
    span: Span,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let removed = self.registry.unregister_if(&self.id, self.token);
        self.span
            .in_scope(|| tracing::debug!(removed, "Event stream closed"));
    }
}

/// Response body draining a connection's sink.
///
/// Ends when the registry drops the sender (dead connection).
struct EventStream {
    rx: mpsc::Receiver<Bytes>,
    _guard: StreamGuard,
}

impl Stream for EventStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}
