//! Static registry of launchable backend programs.
//!
//! A backend is an external executable speaking newline-delimited JSON-RPC
//! over its stdio pipes. The registry maps a logical name to the launch
//! descriptor and is read-only after construction; sessions hold a copy of
//! the descriptor they were spawned from.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How to launch one backend program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Logical name, unique within the registry.
    pub name: String,
    /// Executable path or command name.
    pub command: String,
    /// Arguments passed to the executable, in order.
    #[serde(default)]
    pub args: Vec<String>,
    /// Human-readable description, surfaced by `list`.
    #[serde(default)]
    pub description: String,
}

/// Config-file entry: the descriptor minus the name, which is the map key.
#[derive(Debug, Deserialize)]
struct BackendEntry {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    description: String,
}

/// Read-only table of available backends.
#[derive(Debug)]
pub struct BackendRegistry {
    backends: Vec<BackendDescriptor>,
}

impl BackendRegistry {
    /// Builds a registry from an explicit descriptor list.
    ///
    /// Duplicate names are a construction error.
    pub fn from_descriptors(backends: Vec<BackendDescriptor>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for descriptor in &backends {
            if !seen.insert(descriptor.name.as_str()) {
                return Err(RelayError::Config(format!(
                    "duplicate backend name: {}",
                    descriptor.name
                )));
            }
        }
        Ok(Self { backends })
    }

    /// Loads a registry from a JSON config file mapping backend names to
    /// launch descriptors:
    ///
    /// ```json
    /// {
    ///   "filesystem": {
    ///     "command": "npx",
    ///     "args": ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"],
    ///     "description": "Filesystem access rooted at /tmp"
    ///   }
    /// }
    /// ```
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let entries: BTreeMap<String, BackendEntry> = serde_json::from_str(&raw)?;
        let backends = entries
            .into_iter()
            .map(|(name, entry)| BackendDescriptor {
                name,
                command: entry.command,
                args: entry.args,
                description: entry.description,
            })
            .collect();
        Ok(Self { backends })
    }

    /// Looks up the descriptor for a logical backend name.
    pub fn describe(&self, name: &str) -> Result<&BackendDescriptor> {
        self.backends
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| RelayError::BackendNotFound(name.to_string()))
    }

    /// All registered backends, in stable order.
    pub fn list(&self) -> &[BackendDescriptor] {
        &self.backends
    }
}
