//! Process-wide table of live sessions.

use crate::backend::BackendRegistry;
use crate::error::{RelayError, Result};
use crate::session::{Session, SessionConfig};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Owns every live [`Session`], keyed by an opaque session id.
///
/// Constructed once at startup and injected into the transport layer.
/// Sessions are never evicted implicitly: an abandoned session lives until
/// [`close`](SessionRegistry::close) is called or the process exits.
pub struct SessionRegistry {
    backends: BackendRegistry,
    sessions: DashMap<String, Arc<Session>>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(backends: BackendRegistry, config: SessionConfig) -> Self {
        Self {
            backends,
            sessions: DashMap::new(),
            config,
        }
    }

    /// The backend table this registry spawns from.
    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    /// Spawns a new session for the named backend and returns its fresh id
    /// together with the session handle.
    pub fn create(&self, backend_name: &str) -> Result<(String, Arc<Session>)> {
        let descriptor = self.backends.describe(backend_name)?;
        let session_id = Uuid::new_v4().to_string();
        let session = Session::spawn(session_id.clone(), descriptor, self.config.clone())?;
        self.sessions.insert(session_id.clone(), session.clone());
        info!(session_id = %session_id, backend = %backend_name, "session created");
        Ok((session_id, session))
    }

    pub fn get(&self, session_id: &str) -> Result<Arc<Session>> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RelayError::SessionNotFound(session_id.to_string()))
    }

    /// Removes the mapping without destroying the session. Callers normally
    /// want [`close`](SessionRegistry::close) instead.
    pub fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.remove(session_id).map(|(_, session)| session)
    }

    /// Removes the session from the table and destroys it: the id stops
    /// resolving before teardown begins.
    pub async fn close(&self, session_id: &str) -> Result<()> {
        let (_, session) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| RelayError::SessionNotFound(session_id.to_string()))?;
        session.destroy().await;
        Ok(())
    }

    /// Destroys every live session. Used at shutdown.
    pub async fn close_all(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            let _ = self.close(&id).await;
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .field("backends", &self.backends.list().len())
            .finish()
    }
}
