//! Service container for dependency injection
//!
//! Wires settings, the validated tree registry and snapshot-backed sessions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;
use crate::domain::{Category, TreeRegistry};
use crate::infrastructure::error::InfraResult;
use crate::infrastructure::memory::MemoryStore;
use crate::infrastructure::session::Session;
use crate::infrastructure::snapshot;

/// Container holding settings and the registry built from them.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Validated tree mappings
    pub registry: Arc<TreeRegistry>,
}

impl ServiceContainer {
    /// Create a container; fails when a configured mapping is invalid.
    pub fn new(settings: Settings) -> InfraResult<Self> {
        let registry = settings.registry()?;
        Ok(Self::with_deps(settings, registry))
    }

    /// Create a container with a custom registry (for testing).
    pub fn with_deps(settings: Settings, registry: TreeRegistry) -> Self {
        Self {
            settings: Arc::new(settings),
            registry: Arc::new(registry),
        }
    }

    /// Tree type to use: the explicit one, else the configured default.
    pub fn tree_type<'a>(&'a self, explicit: Option<&'a str>) -> &'a str {
        explicit.unwrap_or(&self.settings.default_tree)
    }

    /// Snapshot file to use: the explicit one, else the configured default.
    pub fn snapshot_path(&self, explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.settings.snapshot.clone())
    }

    /// Open a session over the snapshot at `path`.
    pub fn session(&self, path: &Path, node_type: &str) -> InfraResult<Session<MemoryStore<Category>>> {
        // fail on an unknown type before touching the file
        self.registry.get(node_type)?;
        let store = snapshot::load(path, node_type)?;
        Ok(Session::for_type(store, &self.registry, node_type)?)
    }
}
