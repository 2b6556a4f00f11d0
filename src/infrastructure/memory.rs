//! In-memory persistence adapter backed by a generational arena
//!
//! Rows scheduled with `create` are visible to bulk shifts immediately (like
//! managed objects of an ORM session) but only count towards `select_edge`
//! once `commit_insert` has run, which mirrors a database that cannot see
//! rows that were not flushed yet.

use generational_arena::{Arena, Index};
use tracing::trace;

use crate::domain::{
    Bound, HasTreeBounds, NodeHandle, NodeId, NodeQuery, NodeView, RangeFilter, RangeShift,
    ShiftTarget,
};
use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::traits::PersistenceAdapter;

#[derive(Debug, Clone)]
struct Row<N> {
    id: Option<NodeId>,
    node: N,
    /// Deleted inside an open transaction; purged at the outermost commit.
    deleted: bool,
}

impl<N> Row<N> {
    fn new(id: Option<NodeId>, node: N) -> Self {
        Self {
            id,
            node,
            deleted: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Savepoint<N> {
    rows: Arena<Row<N>>,
    next_id: NodeId,
}

/// Arena-backed store for one node type.
///
/// Transactions are savepoint snapshots: `rollback` restores the rows as they
/// were at the matching `begin_atomic`. Rows created inside the scope are
/// removed from the arena, which advances their slot generation, so handles
/// created inside a rolled-back scope become invalid and are never reused.
/// Rows deleted inside a transaction stay in their slot as tombstones until
/// the outermost commit, so a rollback can bring them back under the same handle.
#[derive(Debug, Clone)]
pub struct MemoryStore<N> {
    node_type: String,
    rows: Arena<Row<N>>,
    next_id: NodeId,
    savepoints: Vec<Savepoint<N>>,
}

impl<N: HasTreeBounds + Clone> MemoryStore<N> {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            rows: Arena::new(),
            next_id: 1,
            savepoints: Vec::new(),
        }
    }

    /// Insert an already persisted row with a known identifier (snapshot loading).
    pub fn insert_persisted(&mut self, id: NodeId, node: N) -> NodeHandle {
        self.next_id = self.next_id.max(id + 1);
        NodeHandle::from_index(self.rows.insert(Row::new(Some(id), node)))
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut N> {
        self.live_mut(handle).map(|row| &mut row.node)
    }

    pub fn id_of(&self, handle: NodeHandle) -> Option<NodeId> {
        self.live(handle).and_then(|row| row.id)
    }

    pub fn handle_of(&self, id: NodeId) -> Option<NodeHandle> {
        self.live_rows()
            .find(|(_, row)| row.id == Some(id))
            .map(|(idx, _)| NodeHandle::from_index(idx))
    }

    pub fn len(&self) -> usize {
        self.live_rows().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All handles in arena order.
    pub fn handles(&self) -> Vec<NodeHandle> {
        self.live_rows()
            .map(|(idx, _)| NodeHandle::from_index(idx))
            .collect()
    }

    fn live(&self, handle: NodeHandle) -> Option<&Row<N>> {
        self.rows.get(handle.index()).filter(|row| !row.deleted)
    }

    fn live_mut(&mut self, handle: NodeHandle) -> Option<&mut Row<N>> {
        self.rows.get_mut(handle.index()).filter(|row| !row.deleted)
    }

    fn live_rows(&self) -> impl Iterator<Item = (Index, &Row<N>)> + '_ {
        self.rows.iter().filter(|(_, row)| !row.deleted)
    }

    fn live_rows_mut(&mut self) -> impl Iterator<Item = &mut Row<N>> + '_ {
        self.rows
            .iter_mut()
            .map(|(_, row)| row)
            .filter(|row| !row.deleted)
    }

    fn row(&self, handle: NodeHandle) -> StoreResult<&Row<N>> {
        self.live(handle).ok_or(StoreError::NodeNotFound(handle))
    }

    fn node_mut(&mut self, handle: NodeHandle) -> StoreResult<&mut N> {
        self.live_mut(handle)
            .map(|row| &mut row.node)
            .ok_or(StoreError::NodeNotFound(handle))
    }

    /// Physically drop tombstones once no transaction can roll them back.
    fn purge_deleted(&mut self) {
        let dead: Vec<Index> = self
            .rows
            .iter()
            .filter(|(_, row)| row.deleted)
            .map(|(idx, _)| idx)
            .collect();
        for idx in dead {
            self.rows.remove(idx);
        }
    }

    fn to_view(handle: NodeHandle, row: &Row<N>) -> NodeView {
        NodeView {
            handle,
            id: row.id,
            parent: row.node.parent(),
            left: row.node.left(),
            right: row.node.right(),
            level: row.node.level(),
            root: row.node.tree_root(),
        }
    }

    fn views(&self) -> impl Iterator<Item = NodeView> + '_ {
        self.live_rows()
            .map(|(idx, row)| Self::to_view(NodeHandle::from_index(idx), row))
    }
}

impl<N: HasTreeBounds + Clone> PersistenceAdapter for MemoryStore<N> {
    type Node = N;

    fn node_type(&self) -> &str {
        &self.node_type
    }

    fn create(&mut self, node: N) -> NodeHandle {
        NodeHandle::from_index(self.rows.insert(Row::new(None, node)))
    }

    fn commit_insert(&mut self, handle: NodeHandle) -> StoreResult<NodeId> {
        let next_id = self.next_id;
        let row = self
            .live_mut(handle)
            .ok_or(StoreError::NodeNotFound(handle))?;
        if row.id.is_some() {
            return Err(StoreError::AlreadyInserted(handle));
        }
        row.id = Some(next_id);
        self.next_id += 1;
        trace!("commit_insert: {} -> id {}", handle, next_id);
        Ok(next_id)
    }

    fn delete(&mut self, handle: NodeHandle) -> StoreResult<()> {
        if self.savepoints.is_empty() {
            return self
                .rows
                .remove(handle.index())
                .filter(|row| !row.deleted)
                .map(|_| ())
                .ok_or(StoreError::NodeNotFound(handle));
        }
        let row = self
            .live_mut(handle)
            .ok_or(StoreError::NodeNotFound(handle))?;
        row.deleted = true;
        Ok(())
    }

    fn get(&self, handle: NodeHandle) -> Option<&N> {
        self.live(handle).map(|row| &row.node)
    }

    fn view(&self, handle: NodeHandle) -> StoreResult<NodeView> {
        self.row(handle).map(|row| Self::to_view(handle, row))
    }

    fn write_bound(&mut self, handle: NodeHandle, field: Bound, value: i64) -> StoreResult<()> {
        self.node_mut(handle)?.set_bound(field, value);
        Ok(())
    }

    fn write_parent(&mut self, handle: NodeHandle, parent: Option<NodeHandle>) -> StoreResult<()> {
        if let Some(parent) = parent {
            self.row(parent)?;
        }
        self.node_mut(handle)?.set_parent(parent);
        Ok(())
    }

    fn write_level(&mut self, handle: NodeHandle, level: i64) -> StoreResult<()> {
        self.node_mut(handle)?.set_level(level);
        Ok(())
    }

    fn write_root(&mut self, handle: NodeHandle, root: NodeHandle) -> StoreResult<()> {
        self.node_mut(handle)?.set_tree_root(root);
        Ok(())
    }

    fn shift_range(&mut self, shift: &RangeShift) -> StoreResult<usize> {
        let mut changed = 0;
        for row in self.live_rows_mut() {
            let node = &mut row.node;
            // unpositioned rows have no interval to shift
            if node.left() <= 0 || !shift.filter.cond.matches(node.bound(shift.filter.field)) {
                continue;
            }
            match shift.target {
                ShiftTarget::Bound(field) => {
                    let value = node.bound(field);
                    node.set_bound(field, value + shift.delta);
                }
                ShiftTarget::Level => match node.level() {
                    Some(level) => node.set_level(level + shift.delta),
                    None => continue,
                },
            }
            changed += 1;
        }
        Ok(changed)
    }

    fn assign_root(&mut self, filter: &RangeFilter, root: NodeHandle) -> StoreResult<usize> {
        let mut changed = 0;
        for row in self.live_rows_mut() {
            if row.node.left() > 0 && filter.cond.matches(row.node.bound(filter.field)) {
                row.node.set_tree_root(root);
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn select_edge(&self) -> StoreResult<i64> {
        Ok(self
            .live_rows()
            .filter(|(_, row)| row.id.is_some())
            .map(|(_, row)| row.node.right())
            .max()
            .unwrap_or(0))
    }

    fn select_one(&self, query: &NodeQuery) -> StoreResult<Option<NodeView>> {
        Ok(self
            .views()
            .filter(|view| query.matches(view))
            .min_by_key(|view| (view.left, view.handle)))
    }

    fn select_all(&self) -> StoreResult<Vec<NodeView>> {
        let mut all: Vec<NodeView> = self.views().collect();
        all.sort_by_key(|view| (view.left, view.handle));
        Ok(all)
    }

    fn begin_atomic(&mut self) -> StoreResult<()> {
        self.savepoints.push(Savepoint {
            rows: self.rows.clone(),
            next_id: self.next_id,
        });
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.savepoints.pop().ok_or(StoreError::NoTransaction)?;
        if self.savepoints.is_empty() {
            self.purge_deleted();
        }
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        let savepoint = self.savepoints.pop().ok_or(StoreError::NoTransaction)?;
        // removing bumps the slot generation: stale handles stay invalid
        let created: Vec<Index> = self
            .rows
            .iter()
            .filter(|(idx, _)| !savepoint.rows.contains(*idx))
            .map(|(idx, _)| idx)
            .collect();
        for idx in created {
            self.rows.remove(idx);
        }
        let mut saved_rows = savepoint.rows;
        for (idx, saved) in saved_rows.drain() {
            if let Some(row) = self.rows.get_mut(idx) {
                *row = saved;
            }
        }
        self.next_id = savepoint.next_id;
        trace!("rollback: restored savepoint, depth {}", self.savepoints.len());
        Ok(())
    }

    fn transaction_depth(&self) -> usize {
        self.savepoints.len()
    }
}
