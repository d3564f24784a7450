//! HTTP surface over the session registry.

use crate::error::{Result, error_response, json_response};
use axum::{
    Json, Router,
    extract::{Path, State},
    response::Response,
    routing::{get, post},
};
use relay_core::SessionRegistry;
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Configuration for the HTTP bridge server.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Local address to bind the HTTP server to (e.g. `127.0.0.1:3000`).
    /// Use port 0 to bind to a random available port.
    pub bind_addr: SocketAddr,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".parse().unwrap(),
        }
    }
}

/// Builds the bridge router around an injected session registry.
pub fn router(registry: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/servers", get(list_servers))
        .route("/session/create", post(create_session))
        .route("/session/{session_id}/rpc", post(session_rpc))
        .route("/session/{session_id}/tools/list", post(tools_list))
        .route("/session/{session_id}/tools/call", post(tools_call))
        .route("/session/{session_id}/info", get(session_info))
        .route("/session/{session_id}/close", post(session_close))
        .with_state(registry)
}

/// Starts the HTTP bridge server and blocks until shutdown.
///
/// The registry is constructed by the caller and injected here; the bridge
/// owns no session state of its own.
pub async fn start_bridge(config: BridgeConfig, registry: SessionRegistry) -> Result<()> {
    // The bridge has no authentication beyond session ids; exposure past
    // loopback is an explicit deployment decision.
    if !config.bind_addr.ip().is_loopback() {
        warn!(
            "HTTP bridge bound to non-loopback address {}. \
             CORS allows any origin. Restrict access via firewall or reverse proxy.",
            config.bind_addr
        );
    }

    let app = router(Arc::new(registry))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    info!("HTTP bridge listening on http://{}", local_addr);
    // Machine-readable bound port for test infrastructure (matters when port
    // 0 is requested).
    eprintln!("RELAY_BOUND_PORT={}", local_addr.port());

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(registry): State<Arc<SessionRegistry>>) -> Response {
    json_response(json!({
        "status": "ok",
        "activeSessions": registry.session_count(),
    }))
}

async fn list_servers(State(registry): State<Arc<SessionRegistry>>) -> Response {
    json_response(json!({ "servers": registry.backends().list() }))
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    server: String,
}

async fn create_session(
    State(registry): State<Arc<SessionRegistry>>,
    Json(payload): Json<CreateSessionRequest>,
) -> Response {
    let (session_id, session) = match registry.create(&payload.server) {
        Ok(created) => created,
        Err(e) => return error_response(&e),
    };

    // A failed handshake leaves the session usable; callers see
    // initialized=false and may still send.
    if let Err(e) = session.initialize().await {
        warn!(session_id = %session_id, error = %e, "initialize failed, session left uninitialized");
    }

    json_response(json!({
        "sessionId": session_id,
        "server": payload.server,
        "initialized": session.is_initialized(),
    }))
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    method: String,
    params: Option<Value>,
}

async fn session_rpc(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
    Json(payload): Json<RpcRequest>,
) -> Response {
    let session = match registry.get(&session_id) {
        Ok(session) => session,
        Err(e) => return error_response(&e),
    };
    let params = payload.params.unwrap_or_else(|| json!({}));
    match session.send(&payload.method, params).await {
        Ok(response) => json_response(response),
        Err(e) => error_response(&e),
    }
}

async fn tools_list(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Response {
    let session = match registry.get(&session_id) {
        Ok(session) => session,
        Err(e) => return error_response(&e),
    };
    match session.send("tools/list", json!({})).await {
        Ok(response) => json_response(response),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallRequest {
    name: String,
    arguments: Option<Value>,
}

async fn tools_call(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
    Json(payload): Json<ToolCallRequest>,
) -> Response {
    let session = match registry.get(&session_id) {
        Ok(session) => session,
        Err(e) => return error_response(&e),
    };
    let params = json!({
        "name": payload.name,
        "arguments": payload.arguments.unwrap_or_else(|| json!({})),
    });
    match session.send("tools/call", params).await {
        Ok(response) => json_response(response),
        Err(e) => error_response(&e),
    }
}

async fn session_info(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Response {
    match registry.get(&session_id) {
        Ok(session) => {
            json_response(serde_json::to_value(session.info()).unwrap_or_default())
        }
        Err(e) => error_response(&e),
    }
}

async fn session_close(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Response {
    match registry.close(&session_id).await {
        Ok(()) => {
            info!(session_id = %session_id, "session closed via HTTP");
            json_response(json!({ "closed": true, "sessionId": session_id }))
        }
        Err(e) => error_response(&e),
    }
}
