//! Nested-set core: the shift primitive and the structural operations
//!
//! Every structural operation is a sequence of bulk shifts that must run in
//! program order, each one depending on bounds written by the previous one.
//! Multi-statement operations run inside one atomic scope of the adapter.

use tracing::{debug, instrument, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    Bound, Cond, DomainError, NodeHandle, NodeQuery, NodeView, Placement, RangeFilter,
    RangeShift, RemovalMode, TreeMeta,
};
use crate::infrastructure::error::StoreError;
use crate::infrastructure::traits::PersistenceAdapter;

/// Core operations over one store, for one registered tree type.
pub struct RangeTree<'a, S: PersistenceAdapter> {
    store: &'a mut S,
    meta: &'a TreeMeta,
}

impl<'a, S: PersistenceAdapter> RangeTree<'a, S> {
    pub fn new(store: &'a mut S, meta: &'a TreeMeta) -> Self {
        Self { store, meta }
    }

    pub fn store(&self) -> &S {
        &*self.store
    }

    pub fn meta(&self) -> &TreeMeta {
        self.meta
    }

    /// Fresh read of a node.
    pub fn node(&self, handle: NodeHandle) -> ApplicationResult<NodeView> {
        self.store.view(handle).map_err(|e| match e {
            StoreError::NodeNotFound(h) => DomainError::NodeNotFound(h).into(),
            other => ApplicationError::TreeSync {
                operation: "read",
                source: other,
            },
        })
    }

    /// `MAX(right)` as the store sees it.
    pub fn storage_edge(&self) -> ApplicationResult<i64> {
        self.store
            .select_edge()
            .map_err(ApplicationError::sync("select_edge"))
    }

    pub fn select_one(&self, query: &NodeQuery) -> ApplicationResult<Option<NodeView>> {
        self.store
            .select_one(query)
            .map_err(ApplicationError::sync("select_one"))
    }

    pub fn select_all(&self) -> ApplicationResult<Vec<NodeView>> {
        self.store
            .select_all()
            .map_err(ApplicationError::sync("select_all"))
    }

    /// ShiftRange: one bulk statement. Shifts that cannot match are skipped.
    pub fn shift_range(&mut self, shift: RangeShift, operation: &'static str) -> ApplicationResult<usize> {
        if shift.is_noop() {
            return Ok(0);
        }
        debug!("{}", self.meta.render_shift(&shift));
        self.store
            .shift_range(&shift)
            .map_err(ApplicationError::sync(operation))
    }

    /// Shift both bounds of every node whose bound satisfies `cond`: left first, then right.
    fn shift_bounds(&mut self, delta: i64, cond: Cond, operation: &'static str) -> ApplicationResult<()> {
        self.shift_range(RangeShift::bound(Bound::Left, delta, cond), operation)?;
        self.shift_range(RangeShift::bound(Bound::Right, delta, cond), operation)?;
        Ok(())
    }

    /// Run `f` inside one atomic scope; any error rolls the scope back.
    pub fn atomic<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Self) -> ApplicationResult<T>,
    ) -> ApplicationResult<T> {
        self.store
            .begin_atomic()
            .map_err(ApplicationError::sync(operation))?;
        match f(self) {
            Ok(value) => {
                self.store
                    .commit()
                    .map_err(ApplicationError::sync(operation))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.store.rollback() {
                    warn!("{}: rollback failed: {}", operation, rollback);
                }
                Err(err)
            }
        }
    }

    fn write(&mut self, handle: NodeHandle, left: i64, right: i64, operation: &'static str) -> ApplicationResult<()> {
        let sync = ApplicationError::sync(operation);
        self.store
            .write_bound(handle, Bound::Left, left)
            .and_then(|_| self.store.write_bound(handle, Bound::Right, right))
            .map_err(sync)
    }

    fn write_caches(
        &mut self,
        handle: NodeHandle,
        level: i64,
        root: NodeHandle,
        operation: &'static str,
    ) -> ApplicationResult<()> {
        if self.meta.tracks_level() {
            self.store
                .write_level(handle, level)
                .map_err(ApplicationError::sync(operation))?;
        }
        if self.meta.tracks_root() {
            self.store
                .write_root(handle, root)
                .map_err(ApplicationError::sync(operation))?;
        }
        Ok(())
    }

    /// Overwrite position, parent pointer and caches of one node.
    pub fn place(&mut self, placement: &Placement) -> ApplicationResult<()> {
        let Placement { handle, parent, left, right, level, root } = *placement;
        self.write(handle, left, right, "recover")?;
        self.store
            .write_parent(handle, parent)
            .map_err(ApplicationError::sync("recover"))?;
        self.write_caches(handle, level, root, "recover")
    }

    /// AssignRoot: `(edge+1, edge+2)`. Returns the new edge.
    #[instrument(level = "debug", skip(self))]
    pub fn assign_root(&mut self, handle: NodeHandle, edge: i64) -> ApplicationResult<i64> {
        self.write(handle, edge + 1, edge + 2, "assign_root")?;
        self.write_caches(handle, 0, handle, "assign_root")?;
        debug!("assign_root: {} -> [{}, {}]", handle, edge + 1, edge + 2);
        Ok(edge + 2)
    }

    /// AttachChild: open a 2-wide gap at the parent's right bound and place the node in it.
    #[instrument(level = "debug", skip(self))]
    pub fn attach_child(&mut self, parent: NodeHandle, handle: NodeHandle) -> ApplicationResult<()> {
        let parent_view = self.node(parent)?;
        if !parent_view.is_positioned() {
            return Err(DomainError::ParentNotPositioned(parent_view.key()).into());
        }
        let at = parent_view.right;
        let level = parent_view.level.map_or(0, |l| l + 1);
        let root = parent_view.root.unwrap_or(parent);

        self.atomic("attach", |tree| {
            tree.shift_bounds(2, Cond::Gte(at), "attach")?;
            tree.write(handle, at, at + 1, "attach")?;
            tree.store
                .write_parent(handle, Some(parent))
                .map_err(ApplicationError::sync("attach"))?;
            tree.write_caches(handle, level, root, "attach")
        })?;
        debug!("attach: {} under {} -> [{}, {}]", handle, parent, at, at + 1);
        Ok(())
    }

    /// True when no node lies between `outer` and `inner`, i.e. `inner` is a direct child position.
    fn directly_contains(&self, outer: &NodeView, inner: &NodeView) -> ApplicationResult<bool> {
        if !outer.contains(inner) {
            return Ok(false);
        }
        let between = NodeQuery::new()
            .with(Bound::Left, Cond::Between(outer.left + 1, inner.left - 1))
            .with(Bound::Right, Cond::Between(inner.right + 1, outer.right - 1));
        Ok(self.select_one(&between)?.is_none())
    }

    /// Reparent: move a subtree to be the last child of `new_parent`, or the
    /// last root when `new_parent` is None.
    ///
    /// `edge` must be at least the largest bound in use. Returns the change of
    /// the edge (non-zero only when the node had no position yet).
    #[instrument(level = "debug", skip(self))]
    pub fn reparent(
        &mut self,
        handle: NodeHandle,
        new_parent: Option<NodeHandle>,
        edge: i64,
    ) -> ApplicationResult<i64> {
        let node = self.node(handle)?;
        if !node.is_positioned() {
            return match new_parent {
                Some(parent) => self.attach_child(parent, handle).map(|_| 2),
                None => self.assign_root(handle, edge).map(|_| 2),
            };
        }

        let target = match new_parent {
            Some(parent) => {
                let target = self.node(parent)?;
                if target.handle == handle || node.contains(&target) {
                    return Err(DomainError::CycleDetected {
                        node: node.key(),
                        parent: target.key(),
                    }
                    .into());
                }
                if !target.is_positioned() {
                    return Err(DomainError::ParentNotPositioned(target.key()).into());
                }
                if self.directly_contains(&target, &node)? {
                    debug!("reparent: {} already nested in {}", handle, parent);
                    self.store
                        .write_parent(handle, new_parent)
                        .map_err(ApplicationError::sync("reparent"))?;
                    return Ok(0);
                }
                Some(target)
            }
            None if node.parent.is_none() => return Ok(0),
            None => None,
        };

        let (left, right, diff) = (node.left, node.right, node.width());
        let edge = edge.max(self.storage_edge()?);
        let old_level = node.level.unwrap_or(0);

        self.atomic("reparent", |tree| {
            // 1. relocate past the edge, leaving room for the destination gap
            let parked = edge + diff + 1;
            tree.shift_bounds(parked - left, Cond::Between(left, right), "reparent")?;
            // 2. close the gap left behind; the parked subtree moves down with the tail
            tree.shift_bounds(-diff, Cond::Gt(right), "reparent")?;
            let parked = parked - diff;
            let rest_edge = edge - diff;

            // 3. open the gap at the destination, read after compaction
            let (start, level, root) = match &target {
                Some(target) => {
                    let parent = tree.node(target.handle)?;
                    (
                        parent.right,
                        parent.level.map_or(0, |l| l + 1),
                        parent.root.unwrap_or(parent.handle),
                    )
                }
                None => (rest_edge + 1, 0, handle),
            };
            tree.shift_bounds(diff, Cond::Between(start, rest_edge), "reparent")?;

            // 4. bring the subtree back from the tail into the gap
            let moved = Cond::Between(parked, parked + diff - 1);
            if tree.meta.tracks_level() {
                tree.shift_range(RangeShift::level(level - old_level, moved), "reparent")?;
            }
            if tree.meta.tracks_root() {
                tree.store
                    .assign_root(&RangeFilter::new(Bound::Left, moved), root)
                    .map_err(ApplicationError::sync("reparent"))?;
            }
            tree.shift_bounds(start - parked, moved, "reparent")?;
            tree.store
                .write_parent(handle, new_parent)
                .map_err(ApplicationError::sync("reparent"))
        })?;
        Ok(0)
    }

    /// Detach: take a node out of its tree and compact the freed interval.
    ///
    /// Leaves free two slots. With [`RemovalMode::Promote`] the children move up to
    /// the node's parent; with [`RemovalMode::Cascade`] every descendant is deleted.
    /// The node itself keeps existing with bounds `(0, 0)`; deleting it is up to the host.
    /// Returns the number of freed slots.
    #[instrument(level = "debug", skip(self))]
    pub fn detach(&mut self, handle: NodeHandle, mode: RemovalMode) -> ApplicationResult<i64> {
        let node = self.node(handle)?;
        if !node.is_positioned() {
            return Ok(0);
        }
        let (left, right) = (node.left, node.right);
        let inner = Cond::Between(left + 1, right - 1);

        self.atomic("detach", |tree| {
            let freed = if node.is_leaf() {
                2
            } else {
                match mode {
                    RemovalMode::Promote => {
                        tree.promote_children(&node)?;
                        if tree.meta.tracks_level() {
                            tree.shift_range(RangeShift::level(-1, inner), "detach")?;
                        }
                        tree.shift_bounds(-1, inner, "detach")?;
                        2
                    }
                    RemovalMode::Cascade => {
                        let overlapping = NodeQuery::new().with(Bound::Left, inner);
                        while let Some(descendant) = tree.select_one(&overlapping)? {
                            tree.store
                                .delete(descendant.handle)
                                .map_err(ApplicationError::sync("detach"))?;
                        }
                        node.width()
                    }
                }
            };
            tree.shift_bounds(-freed, Cond::Gt(right), "detach")?;
            tree.write(handle, 0, 0, "detach")?;
            debug!("detach: {} freed {} slot(s)", handle, freed);
            Ok(freed)
        })
    }

    fn promote_children(&mut self, node: &NodeView) -> ApplicationResult<()> {
        let children: Vec<NodeView> = self
            .select_all()?
            .into_iter()
            .filter(|v| v.parent == Some(node.handle))
            .collect();
        for child in &children {
            self.store
                .write_parent(child.handle, node.parent)
                .map_err(ApplicationError::sync("detach"))?;
            // children of a removed root become roots of their own trees
            if node.parent.is_none() && self.meta.tracks_root() {
                let subtree = RangeFilter::new(Bound::Left, Cond::Between(child.left, child.right));
                self.store
                    .assign_root(&subtree, child.handle)
                    .map_err(ApplicationError::sync("detach"))?;
            }
        }
        debug!("detach: promoted {} child(ren) of {}", children.len(), node.handle);
        Ok(())
    }

    /// Swap two adjacent blocks, `first` directly followed by `second`.
    ///
    /// `edge` must be at least the largest bound in use.
    #[instrument(level = "debug", skip(self))]
    pub fn swap_adjacent(&mut self, first: &NodeView, second: &NodeView, edge: i64) -> ApplicationResult<()> {
        let edge = edge.max(self.storage_edge()?);
        let width = first.width();
        self.atomic("reorder", |tree| {
            // relocate the first block past the edge
            let parked = edge + 1;
            tree.shift_bounds(parked - first.left, Cond::Between(first.left, first.right), "reorder")?;
            // slide the second block into the vacated position
            tree.shift_bounds(-width, Cond::Between(second.left, second.right), "reorder")?;
            // bring the first block back behind it
            let dest = first.left + second.width();
            tree.shift_bounds(dest - parked, Cond::Between(parked, parked + width - 1), "reorder")
        })
    }
}
