use std::fmt::Display;

use generational_arena::Index;
use termtree::Tree;

use crate::domain::arena::TreeArena;
use crate::domain::entities::NodeView;

pub trait TreeNodeConvert {
    /// One `termtree` per root of the forest.
    fn to_tree_strings(&self) -> Vec<Tree<String>>;
}

impl<T: Display> TreeNodeConvert for TreeArena<T> {
    fn to_tree_strings(&self) -> Vec<Tree<String>> {
        fn build_tree<T: Display>(arena: &TreeArena<T>, node_idx: Index) -> Option<Tree<String>> {
            let node = arena.get_node(node_idx)?;
            let leaves: Vec<_> = node
                .children
                .iter()
                .filter_map(|&child| build_tree(arena, child))
                .collect();
            Some(Tree::new(node.data.to_string()).with_leaves(leaves))
        }

        self.roots()
            .iter()
            .filter_map(|&root| build_tree(self, root))
            .collect()
    }
}

/// Forest implied by the intervals alone (parent pointers are ignored),
/// with `label` computing the data of each node.
///
/// `views` must be ordered by left bound; unpositioned nodes are skipped.
pub fn forest_from_views<T>(views: &[NodeView], label: impl Fn(&NodeView) -> T) -> TreeArena<T> {
    let mut forest = TreeArena::new();
    let mut open: Vec<(i64, Index)> = Vec::new();
    for view in views.iter().filter(|v| v.is_positioned()) {
        while open.last().is_some_and(|&(right, _)| right < view.left) {
            open.pop();
        }
        let parent = open.last().map(|&(_, idx)| idx);
        let idx = forest.insert_node(label(view), parent);
        open.push((view.right, idx));
    }
    forest
}
