//! Typed access to the tree fields of a node record

use crate::domain::entities::{Bound, NodeHandle};

/// Capability implemented explicitly by every node type that lives in a nested-set tree.
///
/// `level` and `tree_root` are optional caches: types that do not track them keep
/// the default accessors, and the engine never relies on them for positioning.
pub trait HasTreeBounds {
    fn left(&self) -> i64;
    fn set_left(&mut self, value: i64);

    fn right(&self) -> i64;
    fn set_right(&mut self, value: i64);

    fn parent(&self) -> Option<NodeHandle>;
    fn set_parent(&mut self, parent: Option<NodeHandle>);

    fn level(&self) -> Option<i64> {
        None
    }
    fn set_level(&mut self, _level: i64) {}

    fn tree_root(&self) -> Option<NodeHandle> {
        None
    }
    fn set_tree_root(&mut self, _root: NodeHandle) {}

    fn bound(&self, field: Bound) -> i64 {
        match field {
            Bound::Left => self.left(),
            Bound::Right => self.right(),
        }
    }

    fn set_bound(&mut self, field: Bound, value: i64) {
        match field {
            Bound::Left => self.set_left(value),
            Bound::Right => self.set_right(value),
        }
    }
}
