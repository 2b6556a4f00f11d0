//! Sibling reordering by adjacent block swaps

use tracing::{debug, instrument};

use crate::application::services::batch::BatchCoordinator;
use crate::application::services::range_tree::RangeTree;
use crate::application::ApplicationResult;
use crate::domain::{Bound, Cond, NodeHandle, NodeQuery, NodeView, Steps};
use crate::infrastructure::traits::PersistenceAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// The sibling directly adjacent to `node` in this direction.
    fn sibling_query(self, node: &NodeView) -> NodeQuery {
        let query = match self {
            Direction::Up => NodeQuery::new().with(Bound::Right, Cond::Eq(node.left - 1)),
            Direction::Down => NodeQuery::new().with(Bound::Left, Cond::Eq(node.right + 1)),
        };
        query.child_of(node.parent)
    }
}

/// Move `handle` past its neighbouring siblings, one swap per step.
///
/// Bounds are re-read before every step since each swap rewrites them.
/// Returns the number of swaps performed; 0 when there is no sibling to pass.
#[instrument(level = "debug", skip(tree, batch))]
pub fn move_sibling<S: PersistenceAdapter>(
    tree: &mut RangeTree<'_, S>,
    batch: &BatchCoordinator,
    handle: NodeHandle,
    direction: Direction,
    steps: Steps,
) -> ApplicationResult<usize> {
    batch.ensure_settled("reorder")?;

    let mut swaps = 0;
    while steps.allows(swaps) {
        let node = tree.node(handle)?;
        if !node.is_positioned() {
            break;
        }
        let Some(sibling) = tree.select_one(&direction.sibling_query(&node))? else {
            break;
        };
        let edge = batch.edge(tree)?;
        match direction {
            Direction::Up => tree.swap_adjacent(&sibling, &node, edge)?,
            Direction::Down => tree.swap_adjacent(&node, &sibling, edge)?,
        }
        swaps += 1;
    }
    debug!("move {:?} {}: {} swap(s)", direction, handle, swaps);
    Ok(swaps)
}
