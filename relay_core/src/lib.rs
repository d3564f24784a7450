//! # Relay Core
//!
//! The stdio multiplexing core of the relay bridge: everything needed to hold
//! conversations with long-lived child processes that speak newline-delimited
//! JSON-RPC 2.0 over their standard input/output pipes.
//!
//! The HTTP surface lives in the sibling `relay_http_bridge` crate; this crate
//! has no knowledge of HTTP. It exposes:
//!
//! *   [`BackendRegistry`] — static table of launchable backend programs.
//! *   [`JsonLineDecoder`] — incremental reassembly of raw byte chunks into
//!     complete JSON messages.
//! *   [`RequestCorrelator`] — matches asynchronous responses back to the
//!     callers that produced the requests, by numeric id.
//! *   [`Session`] — one child process plus its decoder and correlator,
//!     driven by a single owning I/O task.
//! *   [`SessionRegistry`] — process-wide table of live sessions.
//!
//! ## Example
//!
//! ```rust,no_run
//! use relay_core::{BackendDescriptor, BackendRegistry, SessionConfig, SessionRegistry};
//!
//! #[tokio::main]
//! async fn main() -> relay_core::Result<()> {
//!     let backends = BackendRegistry::from_descriptors(vec![BackendDescriptor {
//!         name: "echo".into(),
//!         command: "my-echo-server".into(),
//!         args: vec![],
//!         description: "echoes every request".into(),
//!     }])?;
//!
//!     let registry = SessionRegistry::new(backends, SessionConfig::default());
//!     let (session_id, session) = registry.create("echo")?;
//!     session.initialize().await?;
//!     let response = session.send("ping", serde_json::json!({})).await?;
//!     println!("{response}");
//!     registry.close(&session_id).await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod codec;
pub mod correlator;
pub mod error;
pub mod registry;
pub mod session;

pub use backend::{BackendDescriptor, BackendRegistry};
pub use codec::{Frame, JsonLineDecoder};
pub use correlator::RequestCorrelator;
pub use error::{RelayError, Result};
pub use registry::SessionRegistry;
pub use session::{DEFAULT_REQUEST_TIMEOUT_SECS, Session, SessionConfig, SessionInfo};
