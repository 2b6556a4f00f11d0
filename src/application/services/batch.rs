//! Batch coordination for deferred identifier assignment
//!
//! A child can only be attached once its own identifier and its parent's final
//! position are known. Inside one write batch that may be later than the moment
//! the child was persisted, so children wait here and are attached in FIFO order
//! as identifiers resolve.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, instrument};

use crate::application::services::range_tree::RangeTree;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{DomainError, NodeHandle};
use crate::infrastructure::traits::PersistenceAdapter;

/// Per-batch state: cached edge, scheduled inserts and waiting children.
#[derive(Debug, Default)]
pub struct BatchCoordinator {
    /// Edge cached for the current batch; None until the first root assignment.
    edge: Option<i64>,
    /// Nodes seen by pre-persist whose post-persist has not run yet.
    scheduled: HashSet<NodeHandle>,
    /// Children waiting for attachment, in enqueue order.
    waiting: VecDeque<NodeHandle>,
}

impl BatchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts not yet resolved in this batch.
    pub fn pending(&self) -> usize {
        self.scheduled.len() + self.waiting.iter().filter(|h| !self.scheduled.contains(h)).count()
    }

    pub fn is_settled(&self) -> bool {
        self.scheduled.is_empty() && self.waiting.is_empty()
    }

    pub fn cached_edge(&self) -> Option<i64> {
        self.edge
    }

    pub fn is_waiting(&self, handle: NodeHandle) -> bool {
        self.waiting.contains(&handle)
    }

    /// Reject read-dependent operations while inserts are pending.
    pub fn ensure_settled(&self, operation: &'static str) -> ApplicationResult<()> {
        if self.is_settled() {
            Ok(())
        } else {
            Err(ApplicationError::OperationDeferred {
                operation,
                pending: self.pending(),
            })
        }
    }

    /// Current edge: the batch cache when present, else the store's `MAX(right)`.
    pub fn edge<S: PersistenceAdapter>(&self, tree: &RangeTree<'_, S>) -> ApplicationResult<i64> {
        match self.edge {
            Some(edge) => Ok(edge),
            None => tree.storage_edge(),
        }
    }

    /// Apply the net edge change of a structural operation run inside this batch.
    pub fn adjust_edge(&mut self, delta: i64) {
        if let Some(edge) = self.edge.as_mut() {
            *edge += delta;
        }
    }

    /// QueueRootInsert: roots never wait. The edge is read once per batch and
    /// then consumed from the cache, so roots of one batch cannot collide.
    #[instrument(level = "debug", skip(self, tree))]
    pub fn queue_root_insert<S: PersistenceAdapter>(
        &mut self,
        tree: &mut RangeTree<'_, S>,
        handle: NodeHandle,
    ) -> ApplicationResult<()> {
        let edge = self.edge(tree)?;
        let edge = tree.assign_root(handle, edge)?;
        self.edge = Some(edge);
        self.scheduled.insert(handle);
        Ok(())
    }

    /// QueueChildInsert: the node waits until it and its parent are identified.
    #[instrument(level = "debug", skip(self))]
    pub fn queue_child_insert(&mut self, handle: NodeHandle) {
        self.scheduled.insert(handle);
        self.waiting.push_back(handle);
    }

    /// PostInsert: `handle` now has an identifier. Attach every waiting child
    /// that became resolvable, in enqueue order, and keep draining the children
    /// waiting on the nodes just attached.
    ///
    /// Returns the number of nodes positioned by this call.
    #[instrument(level = "debug", skip(self, tree))]
    pub fn post_insert<S: PersistenceAdapter>(
        &mut self,
        tree: &mut RangeTree<'_, S>,
        handle: NodeHandle,
    ) -> ApplicationResult<usize> {
        self.scheduled.remove(&handle);

        let mut positioned = 0;
        let mut resolved = VecDeque::from([handle]);
        while let Some(current) = resolved.pop_front() {
            let mut ready = Vec::new();
            for &waiting in &self.waiting {
                if self.is_resolvable(tree, waiting, current)? {
                    ready.push(waiting);
                }
            }
            for child in ready {
                self.waiting.retain(|h| *h != child);
                self.resolve(tree, child)?;
                positioned += 1;
                resolved.push_back(child);
            }
        }
        Ok(positioned)
    }

    /// A waiting node is resolvable when it was just identified or its parent
    /// just was, and both it and its parent are identified, and the parent has
    /// a position (or was cleared, making the node a root).
    fn is_resolvable<S: PersistenceAdapter>(
        &self,
        tree: &RangeTree<'_, S>,
        handle: NodeHandle,
        current: NodeHandle,
    ) -> ApplicationResult<bool> {
        let node = tree.node(handle)?;
        if node.id.is_none() {
            return Ok(false);
        }
        let Some(parent) = node.parent else {
            return Ok(handle == current);
        };
        if handle != current && parent != current {
            return Ok(false);
        }
        if self.waiting.contains(&parent) {
            return Ok(false);
        }
        let parent = tree.node(parent)?;
        Ok(parent.id.is_some() && parent.is_positioned())
    }

    fn resolve<S: PersistenceAdapter>(
        &mut self,
        tree: &mut RangeTree<'_, S>,
        handle: NodeHandle,
    ) -> ApplicationResult<()> {
        match tree.node(handle)?.parent {
            Some(parent) => {
                tree.attach_child(parent, handle)?;
                self.adjust_edge(2);
            }
            None => {
                // parent cleared while waiting: append as a root
                let edge = self.edge(tree)?;
                self.edge = Some(tree.assign_root(handle, edge)?);
            }
        }
        Ok(())
    }

    /// Fail when a child still waits at batch end: its parent was never persisted.
    pub fn check_resolved<S: PersistenceAdapter>(&self, tree: &RangeTree<'_, S>) -> ApplicationResult<()> {
        match self.waiting.front() {
            Some(&node) => {
                let parent = tree.node(node)?.parent.unwrap_or(node);
                Err(DomainError::UnresolvedParent { node, parent }.into())
            }
            None => Ok(()),
        }
    }

    /// Forget a node removed before it was resolved.
    pub fn forget(&mut self, handle: NodeHandle) {
        self.scheduled.remove(&handle);
        self.waiting.retain(|h| *h != handle);
    }

    /// Batch end: the edge cache is invalidated.
    pub fn finish(&mut self) {
        let edge = self.edge.take();
        debug!("finish batch: edge cache {:?} dropped", edge);
        self.scheduled.clear();
    }

    /// Drop all batch state after a rollback.
    pub fn reset(&mut self) {
        self.edge = None;
        self.scheduled.clear();
        self.waiting.clear();
    }
}
