//! Error types and the core-error → HTTP translation.

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_core::RelayError;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("HTTP server error: {0}")]
    Http(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] RelayError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

pub(crate) fn json_response(value: Value) -> Response {
    json_response_with_status(StatusCode::OK, value)
}

pub(crate) fn json_response_with_status(status: StatusCode, value: Value) -> Response {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&value).unwrap_or_default()))
        .unwrap_or_else(|_| (status, "failed to build response").into_response())
}

/// Maps a core error to an HTTP status plus a JSON-RPC style error body.
pub(crate) fn error_response(err: &RelayError) -> Response {
    let (status, code) = match err {
        RelayError::BackendNotFound(_) | RelayError::SessionNotFound(_) => {
            (StatusCode::NOT_FOUND, -32001)
        }
        RelayError::RequestTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, -32002),
        RelayError::SessionClosed | RelayError::Canceled(_) => (StatusCode::CONFLICT, -32003),
        RelayError::Initialize(_) => (StatusCode::BAD_GATEWAY, -32603),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, -32603),
    };
    json_response_with_status(
        status,
        json!({
            "jsonrpc": "2.0",
            "error": { "code": code, "message": err.to_string() }
        }),
    )
}
