//! Unit of work driving the tree lifecycle hooks
//!
//! A [`Session`] plays the part of an ORM entity manager: nodes are scheduled
//! with [`persist`](Session::persist), parent changes and removals are recorded,
//! and [`flush`](Session::flush) writes everything in one transaction, calling
//! the listener at each lifecycle point. Identifiers become known only during
//! the flush.

use tracing::{debug, instrument, warn};

use crate::application::services::{FlushBatch, NestedSetListener, TreeLifecycle, Verification};
use crate::application::ApplicationResult;
use crate::domain::{ConfigurationError, NodeHandle, NodeId, Placement, Steps, TreeRegistry};
use crate::infrastructure::error::InfraResult;
use crate::infrastructure::traits::PersistenceAdapter;

/// Write batch over one store.
pub struct Session<S: PersistenceAdapter, L: TreeLifecycle<S> = NestedSetListener> {
    store: S,
    listener: L,
    /// Scheduled inserts in persist order.
    inserts: Vec<NodeHandle>,
    removals: Vec<NodeHandle>,
    pending: FlushBatch,
    /// Whether the batch transaction is open.
    open: bool,
}

impl<S: PersistenceAdapter> Session<S, NestedSetListener> {
    /// Session with the nested-set listener of the store's node type.
    pub fn open(store: S, registry: &TreeRegistry) -> Result<Self, ConfigurationError> {
        let listener = NestedSetListener::for_store(registry, &store)?;
        Ok(Self::with_listener(store, listener))
    }

    /// Session for a named node type; fails when the store holds another type.
    pub fn for_type(store: S, registry: &TreeRegistry, node_type: &str) -> Result<Self, ConfigurationError> {
        if store.node_type() != node_type {
            return Err(ConfigurationError::TypeMismatch {
                node_type: node_type.to_string(),
                store: store.node_type().to_string(),
            });
        }
        Self::open(store, registry)
    }

    pub fn listener(&self) -> &NestedSetListener {
        &self.listener
    }

    /// Move a persisted node immediately instead of at flush time.
    pub fn move_to(&mut self, handle: NodeHandle, parent: Option<NodeHandle>) -> ApplicationResult<()> {
        self.listener.reparent(&mut self.store, handle, parent)
    }

    pub fn move_up(&mut self, handle: NodeHandle, steps: Steps) -> ApplicationResult<usize> {
        self.listener.move_up(&mut self.store, handle, steps)
    }

    pub fn move_down(&mut self, handle: NodeHandle, steps: Steps) -> ApplicationResult<usize> {
        self.listener.move_down(&mut self.store, handle, steps)
    }

    pub fn verify(&mut self) -> ApplicationResult<Verification> {
        self.listener.verify(&mut self.store)
    }

    pub fn plan_recovery(&mut self) -> ApplicationResult<Vec<Placement>> {
        self.listener.plan_recovery(&mut self.store)
    }

    pub fn recover(&mut self) -> ApplicationResult<usize> {
        self.listener.recover(&mut self.store)
    }
}

impl<S: PersistenceAdapter, L: TreeLifecycle<S>> Session<S, L> {
    pub fn with_listener(store: S, listener: L) -> Self {
        Self {
            store,
            listener,
            inserts: Vec::new(),
            removals: Vec::new(),
            pending: FlushBatch::default(),
            open: false,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access; bypasses the listener.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Whether anything is scheduled for the next flush.
    pub fn is_dirty(&self) -> bool {
        !self.inserts.is_empty() || !self.removals.is_empty() || !self.pending.is_empty()
    }

    fn begin(&mut self) -> InfraResult<()> {
        if !self.open {
            self.store.begin_atomic()?;
            self.open = true;
        }
        Ok(())
    }

    /// Schedule a node for insertion. Roots get their interval right away,
    /// children wait for the flush.
    #[instrument(level = "debug", skip(self, node))]
    pub fn persist(&mut self, node: S::Node) -> InfraResult<NodeHandle> {
        self.begin()?;
        let handle = self.store.create(node);
        self.inserts.push(handle);
        if let Err(err) = self.listener.on_pre_persist(&mut self.store, handle) {
            self.abort();
            return Err(err.into());
        }
        Ok(handle)
    }

    /// Change a node's parent. Positioned nodes are moved at flush; a child
    /// still waiting in this batch just gets the new pointer.
    #[instrument(level = "debug", skip(self))]
    pub fn set_parent(&mut self, handle: NodeHandle, parent: Option<NodeHandle>) -> InfraResult<()> {
        self.begin()?;
        let view = self.store.view(handle)?;
        if view.is_positioned() {
            self.pending.reparents.retain(|(h, _)| *h != handle);
            self.pending.reparents.push((handle, parent));
        } else {
            self.store.write_parent(handle, parent)?;
        }
        Ok(())
    }

    /// Schedule a node for deletion at flush.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&mut self, handle: NodeHandle) -> InfraResult<()> {
        self.begin()?;
        self.store.view(handle)?;
        if !self.removals.contains(&handle) {
            self.removals.push(handle);
        }
        Ok(())
    }

    /// Write the batch: inserts, then removals, then parent changes; commit.
    ///
    /// Any failure rolls the whole batch back and resets the listener.
    /// Returns the identifiers assigned to the inserted nodes.
    #[instrument(level = "debug", skip(self))]
    pub fn flush(&mut self) -> InfraResult<Vec<(NodeHandle, NodeId)>> {
        if !self.open {
            return Ok(Vec::new());
        }
        match self.write_batch() {
            Ok(ids) => {
                self.store.commit()?;
                self.open = false;
                self.clear();
                debug!("flush: {} insert(s) committed", ids.len());
                Ok(ids)
            }
            Err(err) => {
                warn!("flush failed, rolling back batch: {}", err);
                self.abort();
                Err(err)
            }
        }
    }

    fn write_batch(&mut self) -> InfraResult<Vec<(NodeHandle, NodeId)>> {
        let mut ids = Vec::with_capacity(self.inserts.len());
        for &handle in &self.inserts {
            let id = self.store.commit_insert(handle)?;
            ids.push((handle, id));
            self.listener.on_post_persist(&mut self.store, handle)?;
        }
        for &handle in &self.removals {
            if self.store.get(handle).is_none() {
                debug!("flush: {} already removed", handle);
                continue;
            }
            self.listener.on_pre_remove(&mut self.store, handle)?;
            self.store.delete(handle)?;
        }
        self.pending
            .reparents
            .retain(|(handle, _)| self.store.get(*handle).is_some());
        self.listener.on_flush(&mut self.store, &self.pending)?;
        Ok(ids)
    }

    /// Drop the batch without writing it.
    pub fn rollback(&mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if self.open {
            if let Err(err) = self.store.rollback() {
                warn!("rollback failed: {}", err);
            }
            self.open = false;
        }
        self.listener.on_batch_abort();
        self.clear();
    }

    fn clear(&mut self) {
        self.inserts.clear();
        self.removals.clear();
        self.pending = FlushBatch::default();
    }
}
