//! # Relay HTTP Bridge
//!
//! A thin HTTP front for [`relay_core`]: clients create sessions against
//! named backend programs and exchange JSON-RPC requests with them over
//! plain HTTP, while the core multiplexes each session onto a child
//! process's stdio pipes.
//!
//! This crate deliberately contains no protocol logic. It translates HTTP
//! routes into the core operations (create, send, info, close, list) and the
//! core's typed errors into status codes; everything else lives in
//! `relay_core`.
//!
//! ## Endpoints
//!
//! | Route | Effect |
//! |---|---|
//! | `GET  /health` | liveness plus active session count |
//! | `GET  /servers` | configured backends |
//! | `POST /session/create` | spawn + initialize a session |
//! | `POST /session/{id}/rpc` | generic JSON-RPC call |
//! | `POST /session/{id}/tools/list` | shorthand for `tools/list` |
//! | `POST /session/{id}/tools/call` | shorthand for `tools/call` |
//! | `GET  /session/{id}/info` | session snapshot |
//! | `POST /session/{id}/close` | terminate the session |
//!
//! ## Example
//!
//! ```rust,no_run
//! use relay_core::{BackendRegistry, SessionConfig, SessionRegistry};
//! use relay_http_bridge::{BridgeConfig, start_bridge};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backends = BackendRegistry::from_file("backends.json")?;
//!     let registry = SessionRegistry::new(backends, SessionConfig::default());
//!     start_bridge(BridgeConfig::default(), registry).await?;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod error;

pub use bridge::{BridgeConfig, router, start_bridge};
pub use error::{BridgeError, Result};
