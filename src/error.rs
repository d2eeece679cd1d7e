//! Unified error handling for esl-pushd.
//!
//! This module provides the error hierarchy for the push service: sink write
//! failures, registration rejections and the HTTP-facing API error with its
//! status mapping and metric labels.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

// ============================================================================
// Sink Errors (transport writes)
// ============================================================================

/// A write to a connection's sink failed. The registry treats both cases as
/// "client gone".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("client stream closed")]
    Closed,

    #[error("client stream buffer full")]
    Full,
}

// ============================================================================
// Registration Errors
// ============================================================================

/// Reasons a connection was not registered.
///
/// Capacity rejections are an expected outcome, not a fault. The boolean
/// `register` folds all of these into `false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("connection limit reached ({limit})")]
    GlobalCapacity { limit: usize },

    #[error("connection limit for store {store_id} reached ({limit})")]
    StoreCapacity { store_id: String, limit: usize },

    #[error("connection id {0} is already registered")]
    DuplicateId(String),

    #[error("confirmation write failed: {0}")]
    Unreachable(#[from] SinkError),

    /// The `connected` confirmation could not be serialized. Not expected
    /// in practice; surfaced as a server error rather than a rejection.
    #[error("failed to encode confirmation: {0}")]
    Encode(String),
}

impl RegisterError {
    /// Get a static reason string for metrics labeling.
    #[inline]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::GlobalCapacity { .. } => "global_capacity",
            Self::StoreCapacity { .. } => "store_capacity",
            Self::DuplicateId(_) => "duplicate_id",
            Self::Unreachable(_) => "unreachable",
            Self::Encode(_) => "encode",
        }
    }
}

// ============================================================================
// API Errors (HTTP layer)
// ============================================================================

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Rejected(#[from] RegisterError),

    #[error("event type 'connected' is reserved for the server")]
    ReservedEventType,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Rejected(RegisterError::GlobalCapacity { .. })
            | Self::Rejected(RegisterError::StoreCapacity { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Rejected(RegisterError::DuplicateId(_)) => StatusCode::CONFLICT,
            Self::Rejected(RegisterError::Unreachable(_))
            | Self::Rejected(RegisterError::Encode(_))
            | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ReservedEventType => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && !matches!(self, Self::Rejected(_)) {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
