//! Domain entities: node references, bounds and range predicates

use std::fmt;

use generational_arena::Index;

/// Identifier assigned by the persistence layer once a node's insert is committed.
pub type NodeId = u64;

/// Stable reference to a node, known from the moment the node is created.
///
/// Parent and root pointers are stored as handles, never as live references,
/// so a node can point at a parent whose identifier is still unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle(Index);

impl NodeHandle {
    pub fn from_index(index: Index) -> Self {
        Self(index)
    }

    pub fn index(&self) -> Index {
        self.0
    }

    /// Arena slot number, used for display only.
    pub fn slot(&self) -> usize {
        self.0.into_raw_parts().0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.slot())
    }
}

/// The two interval bounds of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    Left,
    Right,
}

/// Field written by a [`RangeShift`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftTarget {
    Bound(Bound),
    Level,
}

/// Numeric condition applied to one bound field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq(i64),
    Gt(i64),
    Gte(i64),
    Lt(i64),
    /// Inclusive on both ends.
    Between(i64, i64),
}

impl Cond {
    pub fn matches(&self, value: i64) -> bool {
        match *self {
            Cond::Eq(x) => value == x,
            Cond::Gt(x) => value > x,
            Cond::Gte(x) => value >= x,
            Cond::Lt(x) => value < x,
            Cond::Between(lo, hi) => lo <= value && value <= hi,
        }
    }

    /// True when no value can satisfy the condition.
    pub fn is_empty(&self) -> bool {
        matches!(*self, Cond::Between(lo, hi) if lo > hi)
    }
}

/// Predicate "`field` satisfies `cond`".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeFilter {
    pub field: Bound,
    pub cond: Cond,
}

impl RangeFilter {
    pub fn new(field: Bound, cond: Cond) -> Self {
        Self { field, cond }
    }

    pub fn matches(&self, view: &NodeView) -> bool {
        self.cond.matches(view.bound(self.field))
    }
}

/// One bulk update: add `delta` to `target` on every node matching `filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeShift {
    pub target: ShiftTarget,
    pub delta: i64,
    pub filter: RangeFilter,
}

impl RangeShift {
    /// Shift a bound field, filtering on the same field.
    pub fn bound(field: Bound, delta: i64, cond: Cond) -> Self {
        Self {
            target: ShiftTarget::Bound(field),
            delta,
            filter: RangeFilter::new(field, cond),
        }
    }

    /// Shift the level cache of every node whose left bound satisfies `cond`.
    pub fn level(delta: i64, cond: Cond) -> Self {
        Self {
            target: ShiftTarget::Level,
            delta,
            filter: RangeFilter::new(Bound::Left, cond),
        }
    }

    /// A shift that cannot change anything is skipped by the core.
    pub fn is_noop(&self) -> bool {
        self.delta == 0 || self.filter.cond.is_empty()
    }
}

/// Read-only snapshot of a node's tree fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    pub handle: NodeHandle,
    pub id: Option<NodeId>,
    pub parent: Option<NodeHandle>,
    pub left: i64,
    pub right: i64,
    pub level: Option<i64>,
    pub root: Option<NodeHandle>,
}

impl NodeView {
    pub fn bound(&self, field: Bound) -> i64 {
        match field {
            Bound::Left => self.left,
            Bound::Right => self.right,
        }
    }

    /// Subtree diff: `right - left + 1`, twice the number of nodes in the subtree.
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    pub fn is_positioned(&self) -> bool {
        self.left > 0 && self.right > 0
    }

    pub fn is_leaf(&self) -> bool {
        self.right == self.left + 1
    }

    /// Strict interval containment.
    pub fn contains(&self, other: &NodeView) -> bool {
        self.left < other.left && other.right < self.right
    }

    /// Name used in diagnostics: the identifier when known, else the handle.
    pub fn key(&self) -> NodeKey {
        NodeKey {
            id: self.id,
            handle: self.handle,
        }
    }
}

impl fmt::Display for NodeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {}]", self.key(), self.left, self.right)
    }
}

/// Display name of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeKey {
    pub id: Option<NodeId>,
    pub handle: NodeHandle,
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}", id),
            None => write!(f, "{}", self.handle),
        }
    }
}

/// Criteria for `select_one`: every filter must match, and the parent when given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeQuery {
    pub filters: Vec<RangeFilter>,
    pub parent: Option<Option<NodeHandle>>,
}

impl NodeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: Bound, cond: Cond) -> Self {
        self.filters.push(RangeFilter::new(field, cond));
        self
    }

    /// Restrict to children of `parent` (`None` selects roots).
    pub fn child_of(mut self, parent: Option<NodeHandle>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn matches(&self, view: &NodeView) -> bool {
        if let Some(parent) = self.parent {
            if view.parent != parent {
                return false;
            }
        }
        self.filters.iter().all(|f| f.matches(view))
    }
}

/// How many positions a sibling move should travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steps {
    By(usize),
    ToEnd,
}

impl Steps {
    pub fn allows(&self, done: usize) -> bool {
        match *self {
            Steps::By(n) => done < n,
            Steps::ToEnd => true,
        }
    }
}

/// Canonical position of one node as computed by a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub handle: NodeHandle,
    pub parent: Option<NodeHandle>,
    pub left: i64,
    pub right: i64,
    pub level: i64,
    pub root: NodeHandle,
}

/// What happens to the descendants of a removed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovalMode {
    /// Children move up to the removed node's parent.
    #[default]
    Promote,
    /// The whole subtree is removed.
    Cascade,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(left: i64, right: i64) -> NodeView {
        NodeView {
            handle: NodeHandle::from_index(Index::from_raw_parts(0, 0)),
            id: None,
            parent: None,
            left,
            right,
            level: None,
            root: None,
        }
    }

    #[test]
    fn cond_between_is_inclusive() {
        let cond = Cond::Between(2, 5);
        assert!(cond.matches(2));
        assert!(cond.matches(5));
        assert!(!cond.matches(6));
        assert!(Cond::Between(5, 4).is_empty());
    }

    #[test]
    fn view_containment_is_strict() {
        let parent = view(1, 6);
        assert!(parent.contains(&view(2, 3)));
        assert!(!parent.contains(&view(1, 6)));
        assert!(!parent.contains(&view(5, 8)));
        assert_eq!(parent.width(), 6);
    }

    #[test]
    fn query_with_parent_restriction_skips_roots() {
        let query = NodeQuery::new()
            .with(Bound::Right, Cond::Eq(3))
            .child_of(Some(NodeHandle::from_index(Index::from_raw_parts(9, 0))));
        assert!(!query.matches(&view(2, 3)));
    }
}
