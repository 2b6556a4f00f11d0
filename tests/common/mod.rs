//! Shared helpers for integration tests
#![allow(dead_code)]

use nestree::domain::{
    Category, HasTreeBounds, NodeHandle, RangeShift, TreeMapping, TreeRegistry,
};
use nestree::infrastructure::error::{StoreError, StoreResult};
use nestree::infrastructure::traits::PersistenceAdapter;
use nestree::infrastructure::{MemoryStore, Session};
use nestree::util::testing;

pub type CategorySession = Session<MemoryStore<Category>>;

/// Registry with the conventional `category` mapping (level and root tracked).
pub fn registry() -> TreeRegistry {
    registry_with(TreeMapping::conventional())
}

pub fn registry_with(mapping: TreeMapping) -> TreeRegistry {
    let mut registry = TreeRegistry::new();
    registry.register("category", &mapping).unwrap();
    registry
}

/// Empty category session.
pub fn session() -> CategorySession {
    testing::init_test_setup();
    Session::open(MemoryStore::new("category"), &registry()).unwrap()
}

pub fn session_with(mapping: TreeMapping) -> CategorySession {
    testing::init_test_setup();
    Session::open(MemoryStore::new("category"), &registry_with(mapping)).unwrap()
}

pub fn bounds<S: PersistenceAdapter>(session: &Session<S>, handle: NodeHandle) -> (i64, i64) {
    let view = session.store().view(handle).unwrap();
    (view.left, view.right)
}

pub fn level<S: PersistenceAdapter>(session: &Session<S>, handle: NodeHandle) -> Option<i64> {
    session.store().view(handle).unwrap().level
}

/// A=(1,4), B=(2,3), C=(5,6); returns (A, B, C).
pub fn two_roots_one_child(session: &mut CategorySession) -> (NodeHandle, NodeHandle, NodeHandle) {
    let a = session.persist(Category::new("A")).unwrap();
    let b = session.persist(Category::child_of("B", a)).unwrap();
    let c = session.persist(Category::new("C")).unwrap();
    session.flush().unwrap();
    (a, b, c)
}

/// Parent P with children in the given order, all in one batch.
pub fn parent_with_children(session: &mut CategorySession, titles: &[&str]) -> (NodeHandle, Vec<NodeHandle>) {
    let parent = session.persist(Category::new("P")).unwrap();
    let children = titles
        .iter()
        .map(|title| session.persist(Category::child_of(*title, parent)).unwrap())
        .collect();
    session.flush().unwrap();
    (parent, children)
}

/// Node type without level and root caches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuItem {
    pub lft: i64,
    pub rgt: i64,
    pub parent: Option<NodeHandle>,
}

impl MenuItem {
    pub fn under(parent: NodeHandle) -> Self {
        Self {
            parent: Some(parent),
            ..Default::default()
        }
    }
}

impl HasTreeBounds for MenuItem {
    fn left(&self) -> i64 {
        self.lft
    }
    fn set_left(&mut self, value: i64) {
        self.lft = value;
    }
    fn right(&self) -> i64 {
        self.rgt
    }
    fn set_right(&mut self, value: i64) {
        self.rgt = value;
    }
    fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }
    fn set_parent(&mut self, parent: Option<NodeHandle>) {
        self.parent = parent;
    }
}

/// Store wrapper rejecting the n-th bulk shift (1-based) and every later one
/// until `heal` is called.
pub struct FailingStore<S> {
    pub inner: S,
    fail_at: usize,
    shifts: usize,
}

impl<S> FailingStore<S> {
    pub fn new(inner: S, fail_at: usize) -> Self {
        Self {
            inner,
            fail_at,
            shifts: 0,
        }
    }

    pub fn heal(&mut self) {
        self.fail_at = usize::MAX;
    }
}

impl<S: PersistenceAdapter> PersistenceAdapter for FailingStore<S> {
    type Node = S::Node;

    fn node_type(&self) -> &str {
        self.inner.node_type()
    }
    fn create(&mut self, node: Self::Node) -> NodeHandle {
        self.inner.create(node)
    }
    fn commit_insert(&mut self, handle: NodeHandle) -> StoreResult<nestree::domain::NodeId> {
        self.inner.commit_insert(handle)
    }
    fn delete(&mut self, handle: NodeHandle) -> StoreResult<()> {
        self.inner.delete(handle)
    }
    fn get(&self, handle: NodeHandle) -> Option<&Self::Node> {
        self.inner.get(handle)
    }
    fn view(&self, handle: NodeHandle) -> StoreResult<nestree::domain::NodeView> {
        self.inner.view(handle)
    }
    fn write_bound(&mut self, handle: NodeHandle, field: nestree::domain::Bound, value: i64) -> StoreResult<()> {
        self.inner.write_bound(handle, field, value)
    }
    fn write_parent(&mut self, handle: NodeHandle, parent: Option<NodeHandle>) -> StoreResult<()> {
        self.inner.write_parent(handle, parent)
    }
    fn write_level(&mut self, handle: NodeHandle, level: i64) -> StoreResult<()> {
        self.inner.write_level(handle, level)
    }
    fn write_root(&mut self, handle: NodeHandle, root: NodeHandle) -> StoreResult<()> {
        self.inner.write_root(handle, root)
    }
    fn shift_range(&mut self, shift: &RangeShift) -> StoreResult<usize> {
        self.shifts += 1;
        if self.shifts >= self.fail_at {
            return Err(StoreError::Rejected {
                statement: format!("{:?}", shift),
                reason: "connection lost".into(),
            });
        }
        self.inner.shift_range(shift)
    }
    fn assign_root(&mut self, filter: &nestree::domain::RangeFilter, root: NodeHandle) -> StoreResult<usize> {
        self.inner.assign_root(filter, root)
    }
    fn select_edge(&self) -> StoreResult<i64> {
        self.inner.select_edge()
    }
    fn select_one(&self, query: &nestree::domain::NodeQuery) -> StoreResult<Option<nestree::domain::NodeView>> {
        self.inner.select_one(query)
    }
    fn select_all(&self) -> StoreResult<Vec<nestree::domain::NodeView>> {
        self.inner.select_all()
    }
    fn begin_atomic(&mut self) -> StoreResult<()> {
        self.inner.begin_atomic()
    }
    fn commit(&mut self) -> StoreResult<()> {
        self.inner.commit()
    }
    fn rollback(&mut self) -> StoreResult<()> {
        self.inner.rollback()
    }
    fn transaction_depth(&self) -> usize {
        self.inner.transaction_depth()
    }
}
