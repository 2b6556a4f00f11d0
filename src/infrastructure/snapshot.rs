//! TOML snapshot of a category forest
//!
//! ```toml
//! [[node]]
//! id = 1
//! title = "Food"
//! left = 1
//! right = 4
//! level = 0
//!
//! [[node]]
//! id = 2
//! title = "Fruit"
//! parent = 1
//! left = 2
//! right = 3
//! level = 1
//! ```
//!
//! Bounds are stored as they are, so a damaged numbering survives a load/save
//! cycle unchanged and can be inspected with `verify`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{Category, NodeHandle, NodeId};
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::memory::MemoryStore;
use crate::infrastructure::traits::PersistenceAdapter;

/// One stored category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: NodeId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub left: i64,
    #[serde(default)]
    pub right: i64,
    #[serde(default)]
    pub level: i64,
}

/// File contents: `[[node]]` tables in left order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, rename = "node")]
    pub nodes: Vec<SnapshotNode>,
}

impl Snapshot {
    /// Read a snapshot; a missing file is an empty forest.
    #[instrument(level = "debug")]
    pub fn read(path: &Path) -> InfraResult<Self> {
        if !path.exists() {
            debug!("snapshot {} does not exist, starting empty", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| InfraError::io(format!("read {}", path.display()), e))?;
        Self::parse(&content).map_err(|message| InfraError::Snapshot {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    #[instrument(level = "debug", skip(self))]
    pub fn write(&self, path: &Path) -> InfraResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| InfraError::Snapshot {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, content).map_err(|e| InfraError::io(format!("write {}", path.display()), e))
    }

    /// Capture every persisted category of `store`, in left order.
    pub fn capture(store: &MemoryStore<Category>) -> InfraResult<Self> {
        let mut nodes = Vec::with_capacity(store.len());
        for view in store.select_all()? {
            let (Some(id), Some(category)) = (view.id, store.get(view.handle)) else {
                continue;
            };
            nodes.push(SnapshotNode {
                id,
                title: category.title.clone(),
                parent: category.parent.and_then(|p| store.id_of(p)),
                left: category.left,
                right: category.right,
                level: category.level,
            });
        }
        Ok(Self { nodes })
    }

    /// Build a store holding the snapshot's nodes with their identifiers.
    ///
    /// Parent identifiers must refer to nodes of the same snapshot. Root caches
    /// are derived from the parent chain.
    pub fn into_store(self, node_type: &str, origin: &Path) -> InfraResult<MemoryStore<Category>> {
        let invalid = |message: String| InfraError::Snapshot {
            path: PathBuf::from(origin),
            message,
        };

        let mut store = MemoryStore::new(node_type);
        let mut handles: HashMap<NodeId, NodeHandle> = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if handles.contains_key(&node.id) {
                return Err(invalid(format!("duplicate node id {}", node.id)));
            }
            let category = Category {
                title: node.title.clone(),
                left: node.left,
                right: node.right,
                level: node.level,
                ..Default::default()
            };
            handles.insert(node.id, store.insert_persisted(node.id, category));
        }

        let mut parents: HashMap<NodeHandle, NodeHandle> = HashMap::new();
        for node in &self.nodes {
            let Some(parent_id) = node.parent else { continue };
            let parent = *handles
                .get(&parent_id)
                .ok_or_else(|| invalid(format!("node {} references unknown parent {}", node.id, parent_id)))?;
            let handle = handles[&node.id];
            parents.insert(handle, parent);
            if let Some(category) = store.get_mut(handle) {
                category.parent = Some(parent);
            }
        }

        for &handle in handles.values() {
            if let Some(root) = top_ancestor(&parents, handle) {
                if let Some(category) = store.get_mut(handle) {
                    category.root = Some(root);
                }
            }
        }
        debug!("snapshot: {} node(s) loaded", store.len());
        Ok(store)
    }
}

/// Topmost ancestor following parent pointers; None on a cycle.
fn top_ancestor(parents: &HashMap<NodeHandle, NodeHandle>, handle: NodeHandle) -> Option<NodeHandle> {
    let mut current = handle;
    for _ in 0..=parents.len() {
        match parents.get(&current) {
            Some(&parent) => current = parent,
            None => return Some(current),
        }
    }
    None
}

/// Load `path` into a store for `node_type`.
pub fn load(path: &Path, node_type: &str) -> InfraResult<MemoryStore<Category>> {
    Snapshot::read(path)?.into_store(node_type, path)
}

/// Save all persisted categories of `store` to `path`.
pub fn save(store: &MemoryStore<Category>, path: &Path) -> InfraResult<()> {
    Snapshot::capture(store)?.write(path)
}
