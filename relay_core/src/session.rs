//! One conversation with one running backend process.
//!
//! A session owns the child process, its frame decoder, and its request
//! correlator. All stdio traffic is funneled through a single I/O task per
//! session, so the decode buffer and pending-request table are only ever
//! touched from one place; callers interact with the task through an mpsc
//! channel (writes) and oneshot handles (responses).

use crate::backend::BackendDescriptor;
use crate::codec::{Frame, JsonLineDecoder};
use crate::correlator::RequestCorrelator;
use crate::error::{RelayError, Result};
use futures::StreamExt;
use serde::Serialize;
use serde_json::{Value, json};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, mpsc};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Deadline applied to every request. Fixed; not configurable per call.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

/// Protocol version sent in the `initialize` handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Construction-time session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a request may wait for its response before it is abandoned.
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Snapshot of a session's state, serializable for status surfaces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub backend: String,
    pub initialized: bool,
    pub pending_requests: usize,
    pub uptime_secs: u64,
}

/// A single conversation with one backend instance.
///
/// Created via [`Session::spawn`] (usually through the
/// [`SessionRegistry`](crate::SessionRegistry)); terminal after
/// [`Session::destroy`] — a closed session rejects further sends rather than
/// reopening the process.
pub struct Session {
    id: String,
    backend: String,
    correlator: RequestCorrelator,
    writer_tx: mpsc::Sender<String>,
    child: Mutex<Option<tokio::process::Child>>,
    initialized: AtomicBool,
    closed: AtomicBool,
    init_lock: Mutex<()>,
    cancel: CancellationToken,
    started_at: Instant,
    config: SessionConfig,
}

impl Session {
    /// Spawns the backend process with all three stdio streams piped and
    /// starts the session's I/O task. Returns immediately; the handshake is
    /// a separate, explicit [`initialize`](Session::initialize) call.
    pub fn spawn(
        session_id: String,
        descriptor: &BackendDescriptor,
        config: SessionConfig,
    ) -> Result<Arc<Self>> {
        let mut child = Command::new(&descriptor.command)
            .args(&descriptor.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(RelayError::Spawn)?;

        let stdin = child.stdin.take().expect("child stdin is piped");
        let stdout = child.stdout.take().expect("child stdout is piped");
        let stderr = child.stderr.take().expect("child stderr is piped");

        let (writer_tx, writer_rx) = mpsc::channel::<String>(64);

        let session = Arc::new(Session {
            id: session_id,
            backend: descriptor.name.clone(),
            correlator: RequestCorrelator::new(),
            writer_tx,
            child: Mutex::new(Some(child)),
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            init_lock: Mutex::new(()),
            cancel: CancellationToken::new(),
            started_at: Instant::now(),
            config,
        });

        tokio::spawn(forward_stderr(session.clone(), stderr));
        tokio::spawn(run_io(session.clone(), writer_rx, stdin, stdout));

        debug!(session_id = %session.id, backend = %session.backend, "spawned backend process");
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Requests still awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            backend: self.backend.clone(),
            initialized: self.is_initialized(),
            pending_requests: self.pending_requests(),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    /// Performs the `initialize` handshake. Idempotent: once the session is
    /// initialized this returns without sending anything. A failed handshake
    /// leaves the session uninitialized but still usable — later `send`
    /// calls proceed regardless.
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.init_lock.lock().await;
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        let response = self
            .send(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "relay",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )
            .await?;

        if let Some(error) = response.get("error") {
            return Err(RelayError::Initialize(error.to_string()));
        }

        self.initialized.store(true, Ordering::SeqCst);
        self.notify("notifications/initialized", json!({})).await?;
        info!(session_id = %self.id, "session initialized");
        Ok(())
    }

    /// Sends a JSON-RPC request and awaits the correlated response.
    ///
    /// The write is fire-and-forget: if the backend has already exited the
    /// request simply expires at its deadline instead of failing fast.
    /// Requests go to the child's stdin in `send` call order; responses may
    /// complete in any order.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        if self.is_closed() {
            return Err(RelayError::SessionClosed);
        }

        let id = self.correlator.next_id();
        let handle = self.correlator.register(id);
        // Re-check after registering: a concurrent destroy may have drained
        // the table already, and this entry must not outlive it.
        if self.is_closed() {
            self.correlator.expire(id);
            return Err(RelayError::SessionClosed);
        }
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let line = serde_json::to_string(&request)?;

        if self.writer_tx.send(line).await.is_err() {
            warn!(
                session_id = %self.id,
                id,
                method,
                "backend writer gone, request will expire"
            );
        }

        match tokio::time::timeout(self.config.request_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RelayError::Canceled("response channel dropped".to_string())),
            Err(_) => {
                self.correlator.expire(id);
                Err(RelayError::RequestTimeout {
                    id,
                    timeout: self.config.request_timeout,
                })
            }
        }
    }

    /// Sends a JSON-RPC notification (no id, no response).
    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        if self.is_closed() {
            return Err(RelayError::SessionClosed);
        }
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        let line = serde_json::to_string(&notification)?;
        if self.writer_tx.send(line).await.is_err() {
            warn!(session_id = %self.id, method, "backend writer gone, notification dropped");
        }
        Ok(())
    }

    /// Terminates the backend process and fails every pending request.
    /// Terminal and idempotent; subsequent `send` calls fail with
    /// [`RelayError::SessionClosed`].
    pub async fn destroy(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();

        if let Some(mut child) = self.child.lock().await.take()
            && let Err(e) = child.kill().await
        {
            debug!(session_id = %self.id, error = %e, "kill after process exit");
        }

        self.correlator.cancel_all("session closed");
        info!(session_id = %self.id, "session closed");
    }

    /// Routes one decoded message from the backend's output stream.
    fn route_message(&self, value: Value) {
        if value.get("method").is_some() {
            // Backend-initiated requests and notifications have no counterpart
            // on the HTTP side.
            debug!(session_id = %self.id, "ignoring backend-initiated message");
            return;
        }
        match value.get("id").and_then(Value::as_u64) {
            Some(id) => {
                if !self.correlator.resolve(id, value) {
                    warn!(
                        session_id = %self.id,
                        id,
                        "stray response with no pending request, discarding"
                    );
                }
            }
            None => {
                warn!(session_id = %self.id, "response without usable id, discarding");
            }
        }
    }

    /// Logs the child's exit. Observational only: pending requests are left
    /// to their deadlines, and later sends will time out rather than fail
    /// fast.
    async fn observe_exit(&self) {
        let status = {
            let mut guard = self.child.lock().await;
            guard.as_mut().and_then(|child| child.try_wait().ok().flatten())
        };
        match status {
            Some(status) => {
                info!(session_id = %self.id, code = ?status.code(), "backend process exited");
            }
            None => info!(session_id = %self.id, "backend stdout closed"),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("backend", &self.backend)
            .field("initialized", &self.is_initialized())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

/// The session's single I/O task: the only place that writes to the child's
/// stdin or consumes its stdout.
async fn run_io(
    session: Arc<Session>,
    mut writer_rx: mpsc::Receiver<String>,
    mut stdin: ChildStdin,
    stdout: ChildStdout,
) {
    let mut frames = FramedRead::new(stdout, JsonLineDecoder::new());

    loop {
        tokio::select! {
            _ = session.cancel.cancelled() => {
                debug!(session_id = %session.id, "I/O task stopped");
                break;
            }

            Some(line) = writer_rx.recv() => {
                debug!(session_id = %session.id, "-> {line}");
                if let Err(e) = write_line(&mut stdin, &line).await {
                    // Write failures are expected after the process exits;
                    // the request expires instead of failing fast.
                    warn!(session_id = %session.id, error = %e, "failed to write to backend stdin");
                }
            }

            frame = frames.next() => {
                match frame {
                    Some(Ok(Frame::Message(value))) => {
                        debug!(session_id = %session.id, "<- {value}");
                        session.route_message(value);
                    }
                    Some(Ok(Frame::Invalid { raw })) => {
                        warn!(
                            session_id = %session.id,
                            line = %raw,
                            "dropping undecodable backend output"
                        );
                    }
                    Some(Err(e)) => {
                        warn!(session_id = %session.id, error = %e, "failed to read backend stdout");
                        break;
                    }
                    None => {
                        session.observe_exit().await;
                        break;
                    }
                }
            }
        }
    }
}

/// Drains the child's stderr into the diagnostic log; never surfaced to
/// callers.
async fn forward_stderr(session: Arc<Session>, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            debug!(session_id = %session.id, "backend stderr: {line}");
        }
    }
}
