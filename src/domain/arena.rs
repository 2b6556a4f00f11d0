use generational_arena::{Arena, Index};
use tracing::instrument;

/// Node in the arena-based forest.
#[derive(Debug)]
pub struct TreeNode<T> {
    pub data: T,
    /// Index of parent node in the arena, None for root nodes
    pub parent: Option<Index>,
    /// Child indices in insertion order
    pub children: Vec<Index>,
}

/// Arena-based forest used to rebuild and render nested-set trees.
///
/// Children keep insertion order, so inserting nodes sorted by their current
/// left bound preserves the existing sibling order.
#[derive(Debug)]
pub struct TreeArena<T> {
    arena: Arena<TreeNode<T>>,
    roots: Vec<Index>,
}

impl<T> Default for TreeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TreeArena<T> {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            roots: Vec::new(),
        }
    }

    /// Insert a node below `parent`, or as a new root when `parent` is None
    /// or no longer present.
    #[instrument(level = "trace", skip(self, data))]
    pub fn insert_node(&mut self, data: T, parent: Option<Index>) -> Index {
        let parent = parent.filter(|p| self.arena.contains(*p));
        let node_idx = self.arena.insert(TreeNode {
            data,
            parent,
            children: Vec::new(),
        });

        match parent.and_then(|p| self.arena.get_mut(p)) {
            Some(parent) => parent.children.push(node_idx),
            None => self.roots.push(node_idx),
        }
        node_idx
    }

    pub fn get_node(&self, idx: Index) -> Option<&TreeNode<T>> {
        self.arena.get(idx)
    }

    pub fn roots(&self) -> &[Index] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Preorder over the whole forest, roots in insertion order.
    pub fn iter(&self) -> TreeIterator<'_, T> {
        TreeIterator::new(self)
    }

    /// Depth-first walk emitting one event on entering and one on leaving each node.
    pub fn walk(&self) -> Walk<'_, T> {
        Walk::new(self)
    }

    /// Number of levels of the deepest tree; 0 for an empty forest.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.roots
            .iter()
            .map(|&root| self.calculate_depth(root))
            .max()
            .unwrap_or(0)
    }

    fn calculate_depth(&self, node_idx: Index) -> usize {
        if let Some(node) = self.get_node(node_idx) {
            1 + node
                .children
                .iter()
                .map(|&child| self.calculate_depth(child))
                .max()
                .unwrap_or(0)
        } else {
            0
        }
    }

    /// Assign nested-set numbers: a running counter incremented on every enter
    /// (the node's left) and every exit (the node's right).
    ///
    /// Returns `(index, left, right, depth)` in preorder.
    pub fn numbering(&self) -> Vec<(Index, i64, i64, i64)> {
        let mut counter = 0i64;
        let mut numbers: Vec<(Index, i64, i64, i64)> = Vec::with_capacity(self.len());
        let mut open: Vec<usize> = Vec::new();
        for visit in self.walk() {
            counter += 1;
            match visit {
                Visit::Enter(idx, depth) => {
                    open.push(numbers.len());
                    numbers.push((idx, counter, 0, depth as i64));
                }
                Visit::Exit(_) => {
                    if let Some(slot) = open.pop() {
                        numbers[slot].2 = counter;
                    }
                }
            }
        }
        numbers
    }
}

pub struct TreeIterator<'a, T> {
    arena: &'a TreeArena<T>,
    stack: Vec<Index>,
}

impl<'a, T> TreeIterator<'a, T> {
    fn new(arena: &'a TreeArena<T>) -> Self {
        let stack = arena.roots.iter().rev().copied().collect();
        Self { arena, stack }
    }
}

impl<'a, T> Iterator for TreeIterator<'a, T> {
    type Item = (Index, &'a TreeNode<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let current_idx = self.stack.pop()?;
        let node = self.arena.get_node(current_idx)?;
        // Push children in reverse order for left-to-right traversal
        for &child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some((current_idx, node))
    }
}

/// Event of a depth-first walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Enter(Index, usize),
    Exit(Index),
}

pub struct Walk<'a, T> {
    arena: &'a TreeArena<T>,
    stack: Vec<(Index, usize, bool)>,
}

impl<'a, T> Walk<'a, T> {
    fn new(arena: &'a TreeArena<T>) -> Self {
        let stack = arena.roots.iter().rev().map(|&r| (r, 0, false)).collect();
        Self { arena, stack }
    }
}

impl<'a, T> Iterator for Walk<'a, T> {
    type Item = Visit;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (idx, depth, entered) = self.stack.pop()?;
            if entered {
                return Some(Visit::Exit(idx));
            }
            let Some(node) = self.arena.get_node(idx) else {
                continue;
            };
            self.stack.push((idx, depth, true));
            for &child in node.children.iter().rev() {
                self.stack.push((child, depth + 1, false));
            }
            return Some(Visit::Enter(idx, depth));
        }
    }
}
