//! Consistency check and canonical rebuild of a numbering

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use itertools::Itertools;
use tracing::{debug, info, instrument, warn};

use crate::application::services::range_tree::RangeTree;
use crate::application::ApplicationResult;
use crate::domain::{NodeHandle, NodeKey, NodeView, Placement, TreeArena, TreeMeta};
use crate::infrastructure::traits::PersistenceAdapter;

/// Gaps longer than this are reported as one range rather than index by index.
const LISTED_GAP_LIMIT: i64 = 16;

/// One violated invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// No bound uses this index.
    Missing(i64),
    /// No bound uses any index in `from..=to`.
    MissingRange { from: i64, to: i64 },
    /// More than one bound uses this index.
    Duplicate(i64),
    DanglingParent { node: NodeKey, parent: NodeHandle },
    /// A bound is not positive or left is not below right.
    InvalidBounds { node: NodeKey, left: i64, right: i64 },
    OutsideParent { node: NodeKey, parent: NodeKey },
    NestedRoot { node: NodeKey, container: NodeKey },
    LevelMismatch { node: NodeKey, expected: i64, actual: Option<i64> },
    RootMismatch { node: NodeKey, expected: NodeHandle, actual: Option<NodeHandle> },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Missing(index) => write!(f, "index [{index}], missing"),
            Diagnostic::MissingRange { from, to } => write!(f, "index [{from}..{to}], missing"),
            Diagnostic::Duplicate(index) => write!(f, "index [{index}], duplicate"),
            Diagnostic::DanglingParent { node, parent } => {
                write!(f, "node [{node}] references missing parent {parent}")
            }
            Diagnostic::InvalidBounds { node, left, right } => {
                write!(f, "node [{node}], bounds ({left}, {right}) are not a valid interval")
            }
            Diagnostic::OutsideParent { node, parent } => {
                write!(f, "node [{node}] lies outside its parent [{parent}]")
            }
            Diagnostic::NestedRoot { node, container } => {
                write!(f, "root [{node}] lies inside node [{container}]")
            }
            Diagnostic::LevelMismatch { node, expected, actual } => match actual {
                Some(actual) => write!(f, "node [{node}], level {actual} should be {expected}"),
                None => write!(f, "node [{node}], level missing, should be {expected}"),
            },
            Diagnostic::RootMismatch { node, expected, actual } => match actual {
                Some(actual) => write!(f, "node [{node}], root {actual} should be {expected}"),
                None => write!(f, "node [{node}], root missing, should be {expected}"),
            },
        }
    }
}

/// Outcome of a verification. Inconsistency is reported as data, not as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Inconsistent(Vec<Diagnostic>),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Verification::Valid => &[],
            Verification::Inconsistent(diagnostics) => diagnostics,
        }
    }
}

/// Check every invariant over the numbered nodes, from the smallest bound to the edge.
///
/// Only rows still carrying the (0, 0) sentinel are skipped; any other
/// non-positive or inverted pair is reported.
#[instrument(level = "debug", skip(tree))]
pub fn verify<S: PersistenceAdapter>(tree: &RangeTree<'_, S>) -> ApplicationResult<Verification> {
    let meta = tree.meta();
    let all = tree.select_all()?;
    let by_handle: HashMap<NodeHandle, &NodeView> = all.iter().map(|n| (n.handle, n)).collect();
    let nodes: Vec<&NodeView> = all.iter().filter(|n| n.left != 0 || n.right != 0).collect();
    if nodes.is_empty() {
        return Ok(Verification::Valid);
    }

    let mut diagnostics = Vec::new();
    check_coverage(tree, &nodes, &mut diagnostics)?;

    for &node in &nodes {
        let well_formed = is_well_formed(node);
        if !well_formed {
            diagnostics.push(Diagnostic::InvalidBounds {
                node: node.key(),
                left: node.left,
                right: node.right,
            });
        }
        match node.parent {
            Some(parent) => match by_handle.get(&parent) {
                None => diagnostics.push(Diagnostic::DanglingParent {
                    node: node.key(),
                    parent,
                }),
                Some(parent) => {
                    if well_formed && !parent.contains(node) {
                        diagnostics.push(Diagnostic::OutsideParent {
                            node: node.key(),
                            parent: parent.key(),
                        });
                    }
                    check_caches(
                        meta,
                        node,
                        parent.level.unwrap_or(0) + 1,
                        parent.root.unwrap_or(parent.handle),
                        &mut diagnostics,
                    );
                }
            },
            None => {
                let container = nodes
                    .iter()
                    .find(|other| is_well_formed(other) && other.contains(node));
                if let Some(container) = container.filter(|_| well_formed) {
                    diagnostics.push(Diagnostic::NestedRoot {
                        node: node.key(),
                        container: container.key(),
                    });
                }
                check_caches(meta, node, 0, node.handle, &mut diagnostics);
            }
        }
    }

    if diagnostics.is_empty() {
        debug!("verify: {} node(s) valid", nodes.len());
        Ok(Verification::Valid)
    } else {
        info!("verify: {} problem(s) found", diagnostics.len());
        Ok(Verification::Inconsistent(diagnostics))
    }
}

/// Every index from the smallest positive bound to the edge is used exactly once.
///
/// Walks the distinct bound values, so the cost does not depend on how far a
/// corrupted bound points.
fn check_coverage<S: PersistenceAdapter>(
    tree: &RangeTree<'_, S>,
    nodes: &[&NodeView],
    diagnostics: &mut Vec<Diagnostic>,
) -> ApplicationResult<()> {
    let usage: Vec<(i64, usize)> = nodes
        .iter()
        .flat_map(|n| [n.left, n.right])
        .filter(|&index| index > 0)
        .counts()
        .into_iter()
        .sorted_unstable()
        .collect();
    let (Some(&(first, _)), Some(&(last, _))) = (usage.first(), usage.last()) else {
        return Ok(());
    };
    let edge = last.max(tree.storage_edge()?);

    let mut next = first;
    for (index, count) in usage {
        report_gap(next, index - 1, diagnostics);
        if count > 1 {
            diagnostics.push(Diagnostic::Duplicate(index));
        }
        next = index + 1;
    }
    report_gap(next, edge, diagnostics);
    Ok(())
}

fn is_well_formed(node: &NodeView) -> bool {
    node.left > 0 && node.left < node.right
}

fn report_gap(from: i64, to: i64, diagnostics: &mut Vec<Diagnostic>) {
    if to - from >= LISTED_GAP_LIMIT {
        diagnostics.push(Diagnostic::MissingRange { from, to });
    } else {
        diagnostics.extend((from..=to).map(Diagnostic::Missing));
    }
}

fn check_caches(
    meta: &TreeMeta,
    node: &NodeView,
    level: i64,
    root: NodeHandle,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if meta.tracks_level() && node.level != Some(level) {
        diagnostics.push(Diagnostic::LevelMismatch {
            node: node.key(),
            expected: level,
            actual: node.level,
        });
    }
    if meta.tracks_root() && node.root != Some(root) {
        diagnostics.push(Diagnostic::RootMismatch {
            node: node.key(),
            expected: root,
            actual: node.root,
        });
    }
}

/// Compute the canonical numbering from parent pointers.
///
/// Siblings keep the order of their current left bounds; unpositioned nodes go
/// last. Dangling parent pointers and parent cycles are cut, the affected node
/// becomes a root.
#[instrument(level = "debug", skip(tree))]
pub fn plan<S: PersistenceAdapter>(tree: &RangeTree<'_, S>) -> ApplicationResult<Vec<Placement>> {
    let nodes: Vec<NodeView> = tree
        .select_all()?
        .into_iter()
        .sorted_by_key(|n| (!n.is_positioned(), n.left, n.handle))
        .collect();
    let known: HashSet<NodeHandle> = nodes.iter().map(|n| n.handle).collect();

    let mut parents: HashMap<NodeHandle, Option<NodeHandle>> = HashMap::with_capacity(nodes.len());
    for node in &nodes {
        let parent = node.parent.filter(|p| {
            let exists = known.contains(p);
            if !exists {
                warn!("recover: [{}] drops dangling parent {}", node.key(), p);
            }
            exists
        });
        parents.insert(node.handle, parent);
    }
    for node in &nodes {
        let mut cursor = parents.get(&node.handle).copied().flatten();
        let mut hops = 0;
        while let Some(ancestor) = cursor {
            if ancestor == node.handle {
                warn!("recover: [{}] closes a parent cycle, made a root", node.key());
                parents.insert(node.handle, None);
                break;
            }
            hops += 1;
            if hops > nodes.len() {
                break;
            }
            cursor = parents.get(&ancestor).copied().flatten();
        }
    }

    let mut children: HashMap<Option<NodeHandle>, Vec<NodeHandle>> = HashMap::new();
    for node in &nodes {
        let parent = parents.get(&node.handle).copied().flatten();
        children.entry(parent).or_default().push(node.handle);
    }

    // breadth-first so every parent is in the forest before its children
    let mut forest = TreeArena::new();
    let mut queue: VecDeque<(NodeHandle, Option<_>)> = children
        .get(&None)
        .into_iter()
        .flatten()
        .map(|&h| (h, None))
        .collect();
    while let Some((handle, parent_idx)) = queue.pop_front() {
        let idx = forest.insert_node(handle, parent_idx);
        if let Some(kids) = children.get(&Some(handle)) {
            queue.extend(kids.iter().map(|&kid| (kid, Some(idx))));
        }
    }

    let mut placements = Vec::with_capacity(forest.len());
    let mut root = None;
    for (idx, left, right, depth) in forest.numbering() {
        let Some(handle) = forest.get_node(idx).map(|n| n.data) else {
            continue;
        };
        if depth == 0 {
            root = Some(handle);
        }
        placements.push(Placement {
            handle,
            parent: parents.get(&handle).copied().flatten(),
            left,
            right,
            level: depth,
            root: root.unwrap_or(handle),
        });
    }
    Ok(placements)
}

/// Recover: write the canonical numbering in one atomic scope.
///
/// Returns the number of nodes whose stored values changed.
#[instrument(level = "debug", skip(tree))]
pub fn recover<S: PersistenceAdapter>(tree: &mut RangeTree<'_, S>) -> ApplicationResult<usize> {
    let placements = plan(tree)?;
    let current: HashMap<NodeHandle, NodeView> = tree
        .select_all()?
        .into_iter()
        .map(|n| (n.handle, n))
        .collect();
    let changed: Vec<&Placement> = placements
        .iter()
        .filter(|p| current.get(&p.handle).map_or(true, |view| differs(tree.meta(), p, view)))
        .collect();

    tree.atomic("recover", |tree| {
        for placement in &changed {
            tree.place(placement)?;
        }
        Ok(())
    })?;
    info!("recover: {} of {} node(s) rewritten", changed.len(), placements.len());
    Ok(changed.len())
}

/// True when writing `placement` would change anything stored for `view`.
pub fn differs(meta: &TreeMeta, placement: &Placement, view: &NodeView) -> bool {
    placement.left != view.left
        || placement.right != view.right
        || placement.parent != view.parent
        || (meta.tracks_level() && view.level != Some(placement.level))
        || (meta.tracks_root() && view.root != Some(placement.root))
}
