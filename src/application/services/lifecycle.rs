//! Lifecycle callbacks of the persistence host
//!
//! The host (see [`crate::infrastructure::session::Session`]) calls the hooks of
//! a [`TreeLifecycle`] in a fixed order per write batch:
//!
//! ```text
//! persist(node)        -> on_pre_persist      (per node, when scheduled)
//! flush()
//!   commit_insert(node) -> on_post_persist     (per node, id now known)
//!   delete(node)        <- on_pre_remove       (per node, before the row goes)
//!                       -> on_flush            (once, pending parent changes)
//! rollback             -> on_batch_abort
//! ```

use tracing::{debug, instrument};

use crate::application::services::batch::BatchCoordinator;
use crate::application::services::range_tree::RangeTree;
use crate::application::services::reorder::{move_sibling, Direction};
use crate::application::services::verifier::{self, Verification};
use crate::application::ApplicationResult;
use crate::domain::{ConfigurationError, NodeHandle, Placement, Steps, TreeMeta, TreeRegistry};
use crate::infrastructure::traits::PersistenceAdapter;

/// Parent changes of already persisted nodes, collected by the host during a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushBatch {
    pub reparents: Vec<(NodeHandle, Option<NodeHandle>)>,
}

impl FlushBatch {
    pub fn is_empty(&self) -> bool {
        self.reparents.is_empty()
    }
}

/// Hooks invoked by the persistence host.
pub trait TreeLifecycle<S: PersistenceAdapter> {
    /// A node was scheduled for insertion; its identifier is not known yet.
    fn on_pre_persist(&mut self, store: &mut S, handle: NodeHandle) -> ApplicationResult<()>;

    /// The node's insert was committed and its identifier assigned.
    fn on_post_persist(&mut self, store: &mut S, handle: NodeHandle) -> ApplicationResult<()>;

    /// The node is about to be deleted.
    fn on_pre_remove(&mut self, store: &mut S, handle: NodeHandle) -> ApplicationResult<()>;

    /// End of the batch, before the host commits.
    fn on_flush(&mut self, store: &mut S, batch: &FlushBatch) -> ApplicationResult<()>;

    /// The batch was rolled back.
    fn on_batch_abort(&mut self) {}
}

/// Keeps one node type's nested-set numbering in sync with host writes.
#[derive(Debug)]
pub struct NestedSetListener {
    meta: TreeMeta,
    batch: BatchCoordinator,
}

impl NestedSetListener {
    pub fn new(meta: TreeMeta) -> Self {
        Self {
            meta,
            batch: BatchCoordinator::new(),
        }
    }

    /// Listener for a registered node type.
    pub fn from_registry(registry: &TreeRegistry, node_type: &str) -> Result<Self, ConfigurationError> {
        Ok(Self::new(registry.get(node_type)?.clone()))
    }

    /// Listener for the node type held by `store`.
    pub fn for_store<S: PersistenceAdapter>(registry: &TreeRegistry, store: &S) -> Result<Self, ConfigurationError> {
        Self::from_registry(registry, store.node_type())
    }

    pub fn meta(&self) -> &TreeMeta {
        &self.meta
    }

    pub fn batch(&self) -> &BatchCoordinator {
        &self.batch
    }

    /// Move a persisted node under `parent` (or to the tail as a root) right away.
    #[instrument(level = "debug", skip(self, store))]
    pub fn reparent<S: PersistenceAdapter>(
        &mut self,
        store: &mut S,
        handle: NodeHandle,
        parent: Option<NodeHandle>,
    ) -> ApplicationResult<()> {
        self.batch.ensure_settled("reparent")?;
        self.reparent_settled(store, handle, parent)
    }

    fn reparent_settled<S: PersistenceAdapter>(
        &mut self,
        store: &mut S,
        handle: NodeHandle,
        parent: Option<NodeHandle>,
    ) -> ApplicationResult<()> {
        let mut tree = RangeTree::new(store, &self.meta);
        let edge = self.batch.edge(&tree)?;
        let delta = tree.reparent(handle, parent, edge)?;
        self.batch.adjust_edge(delta);
        Ok(())
    }

    /// MoveUp: swap with the preceding sibling up to `steps` times.
    pub fn move_up<S: PersistenceAdapter>(&mut self, store: &mut S, handle: NodeHandle, steps: Steps) -> ApplicationResult<usize> {
        let mut tree = RangeTree::new(store, &self.meta);
        move_sibling(&mut tree, &self.batch, handle, Direction::Up, steps)
    }

    /// MoveDown: swap with the following sibling up to `steps` times.
    pub fn move_down<S: PersistenceAdapter>(&mut self, store: &mut S, handle: NodeHandle, steps: Steps) -> ApplicationResult<usize> {
        let mut tree = RangeTree::new(store, &self.meta);
        move_sibling(&mut tree, &self.batch, handle, Direction::Down, steps)
    }

    pub fn verify<S: PersistenceAdapter>(&mut self, store: &mut S) -> ApplicationResult<Verification> {
        self.batch.ensure_settled("verify")?;
        verifier::verify(&RangeTree::new(store, &self.meta))
    }

    /// Canonical numbering that `recover` would write, without writing it.
    pub fn plan_recovery<S: PersistenceAdapter>(&mut self, store: &mut S) -> ApplicationResult<Vec<Placement>> {
        self.batch.ensure_settled("recover")?;
        verifier::plan(&RangeTree::new(store, &self.meta))
    }

    /// Rebuild the numbering from parent pointers; returns the number of nodes rewritten.
    pub fn recover<S: PersistenceAdapter>(&mut self, store: &mut S) -> ApplicationResult<usize> {
        self.batch.ensure_settled("recover")?;
        verifier::recover(&mut RangeTree::new(store, &self.meta))
    }
}

impl<S: PersistenceAdapter> TreeLifecycle<S> for NestedSetListener {
    fn on_pre_persist(&mut self, store: &mut S, handle: NodeHandle) -> ApplicationResult<()> {
        let mut tree = RangeTree::new(store, &self.meta);
        match tree.node(handle)?.parent {
            None => self.batch.queue_root_insert(&mut tree, handle),
            Some(_) => {
                self.batch.queue_child_insert(handle);
                Ok(())
            }
        }
    }

    fn on_post_persist(&mut self, store: &mut S, handle: NodeHandle) -> ApplicationResult<()> {
        let mut tree = RangeTree::new(store, &self.meta);
        let positioned = self.batch.post_insert(&mut tree, handle)?;
        debug!("post_persist {}: {} child(ren) attached", handle, positioned);
        Ok(())
    }

    fn on_pre_remove(&mut self, store: &mut S, handle: NodeHandle) -> ApplicationResult<()> {
        self.batch.forget(handle);
        let mut tree = RangeTree::new(store, &self.meta);
        let freed = tree.detach(handle, self.meta.removal)?;
        self.batch.adjust_edge(-freed);
        Ok(())
    }

    fn on_flush(&mut self, store: &mut S, batch: &FlushBatch) -> ApplicationResult<()> {
        self.batch
            .check_resolved(&RangeTree::new(&mut *store, &self.meta))?;
        for &(handle, parent) in &batch.reparents {
            self.batch.ensure_settled("reparent")?;
            self.reparent_settled(store, handle, parent)?;
        }
        self.batch.finish();
        Ok(())
    }

    fn on_batch_abort(&mut self) {
        debug!("batch aborted: dropping coordinator state");
        self.batch.reset();
    }
}
