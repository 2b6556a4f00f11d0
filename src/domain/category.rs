//! Category: the node type managed by the command line tool

use std::fmt;

use crate::domain::bounds::HasTreeBounds;
use crate::domain::entities::NodeHandle;

/// A titled node tracking both optional caches (level and root).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Category {
    pub title: String,
    pub left: i64,
    pub right: i64,
    pub parent: Option<NodeHandle>,
    pub level: i64,
    pub root: Option<NodeHandle>,
}

impl Category {
    /// New root category, not yet positioned.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// New category below `parent`, not yet positioned.
    pub fn child_of(title: impl Into<String>, parent: NodeHandle) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new(title)
        }
    }
}

impl HasTreeBounds for Category {
    fn left(&self) -> i64 {
        self.left
    }
    fn set_left(&mut self, value: i64) {
        self.left = value;
    }

    fn right(&self) -> i64 {
        self.right
    }
    fn set_right(&mut self, value: i64) {
        self.right = value;
    }

    fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }
    fn set_parent(&mut self, parent: Option<NodeHandle>) {
        self.parent = parent;
    }

    fn level(&self) -> Option<i64> {
        Some(self.level)
    }
    fn set_level(&mut self, level: i64) {
        self.level = level;
    }

    fn tree_root(&self) -> Option<NodeHandle> {
        self.root
    }
    fn set_tree_root(&mut self, root: NodeHandle) {
        self.root = Some(root);
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {}]", self.title, self.left, self.right)
    }
}
