//! Error types for the relay core

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("unknown backend: {0}")]
    BackendNotFound(String),

    #[error("unknown session: {0}")]
    SessionNotFound(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("request {id} received no response within {timeout:?}")]
    RequestTimeout { id: u64, timeout: Duration },

    #[error("request canceled: {0}")]
    Canceled(String),

    #[error("initialize handshake failed: {0}")]
    Initialize(String),

    #[error("failed to spawn backend process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
