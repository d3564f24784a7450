//! Router-level tests driven through `tower::ServiceExt::oneshot`, with
//! scripted mock backends spawned as real child processes.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use relay_core::{BackendDescriptor, BackendRegistry, SessionConfig, SessionRegistry};
use serde_json::{Value, json};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// A backend that answers the initialize handshake (id 1), swallows the
/// `notifications/initialized` notification, then answers the next request
/// (id 2) with the given result payload.
fn handshake_script(second_response: &str) -> String {
    format!(
        r#"read -r init
printf '{{"jsonrpc":"2.0","id":1,"result":{{"protocolVersion":"2024-11-05","capabilities":{{}},"serverInfo":{{"name":"mock","version":"0.0.0"}}}}}}\n'
read -r initialized_notification
read -r request
printf '{{"jsonrpc":"2.0","id":2,"result":{second_response}}}\n'
"#
    )
}

fn write_backend(dir: &TempDir, name: &str, script: &str) -> BackendDescriptor {
    let path = dir.path().join(format!("{name}.sh"));
    fs::write(&path, script).expect("failed to write mock backend script");
    BackendDescriptor {
        name: name.to_string(),
        command: "/bin/sh".to_string(),
        args: vec![path.to_string_lossy().into_owned()],
        description: format!("{name} mock backend"),
    }
}

fn build_app(descriptors: Vec<BackendDescriptor>) -> Router {
    let backends = BackendRegistry::from_descriptors(descriptors).unwrap();
    let registry = SessionRegistry::new(
        backends,
        SessionConfig {
            request_timeout: Duration::from_secs(5),
        },
    );
    relay_http_bridge::router(Arc::new(registry))
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&value).unwrap())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_active_session_count() {
    let app = build_app(vec![]);
    let (status, body) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["activeSessions"], 0);
}

#[tokio::test]
async fn servers_lists_configured_backends() {
    let dir = TempDir::new().unwrap();
    let app = build_app(vec![
        write_backend(&dir, "alpha", "exit 0\n"),
        write_backend(&dir, "beta", "exit 0\n"),
    ]);

    let (status, body) = request(&app, "GET", "/servers", None).await;
    assert_eq!(status, StatusCode::OK);
    let servers = body["servers"].as_array().unwrap();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0]["name"], "alpha");
    assert_eq!(servers[1]["description"], "beta mock backend");
}

#[tokio::test]
async fn create_session_for_unknown_backend_is_404() {
    let app = build_app(vec![]);
    let (status, body) = request(
        &app,
        "POST",
        "/session/create",
        Some(json!({"server": "ghost"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], -32001);
}

#[tokio::test]
async fn session_lifecycle_over_http() {
    let dir = TempDir::new().unwrap();
    let app = build_app(vec![write_backend(
        &dir,
        "echo",
        &handshake_script(r#""pong""#),
    )]);

    // Create: spawns the process and completes the handshake.
    let (status, body) = request(
        &app,
        "POST",
        "/session/create",
        Some(json!({"server": "echo"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["server"], "echo");
    assert_eq!(body["initialized"], true);
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    let (status, body) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["activeSessions"], 1);

    // Generic RPC rides the same session.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/session/{session_id}/rpc"),
        Some(json!({"method": "ping", "params": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "pong");
    assert_eq!(body["id"], 2);

    let (status, body) = request(&app, "GET", &format!("/session/{session_id}/info"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessionId"], session_id.as_str());
    assert_eq!(body["backend"], "echo");
    assert_eq!(body["initialized"], true);
    assert_eq!(body["pendingRequests"], 0);

    let (status, body) = request(
        &app,
        "POST",
        &format!("/session/{session_id}/close"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["closed"], true);

    // The id stops resolving once closed.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/session/{session_id}/rpc"),
        Some(json!({"method": "ping"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], -32001);
}

#[tokio::test]
async fn tools_call_is_forwarded_with_name_and_arguments() {
    let dir = TempDir::new().unwrap();
    let app = build_app(vec![write_backend(
        &dir,
        "tools",
        &handshake_script(r#"{"content":[{"type":"text","text":"tool ok"}]}"#),
    )]);

    let (_, body) = request(
        &app,
        "POST",
        "/session/create",
        Some(json!({"server": "tools"})),
    )
    .await;
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app,
        "POST",
        &format!("/session/{session_id}/tools/call"),
        Some(json!({"name": "scan", "arguments": {"target": "127.0.0.1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["content"][0]["text"], "tool ok");
}

#[tokio::test]
async fn unknown_session_routes_are_404() {
    let app = build_app(vec![]);
    for (method, uri, body) in [
        ("GET", "/session/no-such-id/info", None),
        ("POST", "/session/no-such-id/close", None),
        (
            "POST",
            "/session/no-such-id/rpc",
            Some(json!({"method": "ping"})),
        ),
        ("POST", "/session/no-such-id/tools/list", None),
    ] {
        let (status, payload) = request(&app, method, uri, body).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "uri: {uri}");
        assert_eq!(payload["error"]["code"], -32001, "uri: {uri}");
    }
}
