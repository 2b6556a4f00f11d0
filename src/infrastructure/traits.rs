//! Persistence boundary trait
//!
//! The engine never touches storage directly: every read, write, bulk shift and
//! transaction boundary goes through [`PersistenceAdapter`], so the same
//! algorithms run against the in-memory arena store or any other backend.

use crate::domain::{
    Bound, HasTreeBounds, NodeHandle, NodeId, NodeQuery, NodeView, RangeFilter, RangeShift,
};
use crate::infrastructure::error::StoreResult;

/// Storage of one node type ("table").
pub trait PersistenceAdapter {
    type Node: HasTreeBounds;

    /// Name of the node type held by this store.
    fn node_type(&self) -> &str;

    // ------------------------------------------------------------
    // Node lifecycle
    // ------------------------------------------------------------

    /// Schedule a node for insertion. Its identifier stays unknown until
    /// [`commit_insert`](Self::commit_insert).
    fn create(&mut self, node: Self::Node) -> NodeHandle;

    /// Physically write a scheduled node and assign its identifier.
    fn commit_insert(&mut self, handle: NodeHandle) -> StoreResult<NodeId>;

    /// Remove a node.
    fn delete(&mut self, handle: NodeHandle) -> StoreResult<()>;

    /// Borrow the stored record.
    fn get(&self, handle: NodeHandle) -> Option<&Self::Node>;

    // ------------------------------------------------------------
    // Field access
    // ------------------------------------------------------------

    /// Fresh snapshot of a node's tree fields.
    fn view(&self, handle: NodeHandle) -> StoreResult<NodeView>;

    fn read_bound(&self, handle: NodeHandle, field: Bound) -> StoreResult<i64> {
        self.view(handle).map(|v| v.bound(field))
    }

    fn write_bound(&mut self, handle: NodeHandle, field: Bound, value: i64) -> StoreResult<()>;

    fn write_parent(&mut self, handle: NodeHandle, parent: Option<NodeHandle>) -> StoreResult<()>;

    fn write_level(&mut self, handle: NodeHandle, level: i64) -> StoreResult<()>;

    fn write_root(&mut self, handle: NodeHandle, root: NodeHandle) -> StoreResult<()>;

    // ------------------------------------------------------------
    // Bulk statements and queries
    // ------------------------------------------------------------

    /// Execute one bulk update; returns the number of rows changed.
    fn shift_range(&mut self, shift: &RangeShift) -> StoreResult<usize>;

    /// Set the root cache of every node matching `filter`.
    fn assign_root(&mut self, filter: &RangeFilter, root: NodeHandle) -> StoreResult<usize>;

    /// `MAX(right)` over committed rows, 0 when there are none.
    fn select_edge(&self) -> StoreResult<i64>;

    fn select_one(&self, query: &NodeQuery) -> StoreResult<Option<NodeView>>;

    /// All nodes ordered by left bound.
    fn select_all(&self) -> StoreResult<Vec<NodeView>>;

    // ------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------

    /// Open a transaction scope; nested calls open savepoints.
    fn begin_atomic(&mut self) -> StoreResult<()>;

    fn commit(&mut self) -> StoreResult<()>;

    fn rollback(&mut self) -> StoreResult<()>;

    /// Depth of open transaction scopes.
    fn transaction_depth(&self) -> usize;
}
