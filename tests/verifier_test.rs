//! Integration tests for Verify and Recover

mod common;

use common::{bounds, level, parent_with_children, session, two_roots_one_child};
use nestree::application::services::verifier::Diagnostic;
use nestree::application::services::Verification;
use nestree::domain::Category;
use nestree::infrastructure::traits::PersistenceAdapter;
use rstest::rstest;

// ============================================================
// Verify
// ============================================================

#[test]
fn given_empty_store_when_verified_then_valid() {
    let mut session = session();

    assert_eq!(session.verify().unwrap(), Verification::Valid);
}

#[test]
fn given_engine_built_forest_when_verified_then_valid() {
    // Arrange
    let mut session = session();
    let (a, b, c) = two_roots_one_child(&mut session);
    session.set_parent(c, Some(b)).unwrap();
    session.flush().unwrap();
    session.remove(a).unwrap();
    session.flush().unwrap();

    // Act
    let result = session.verify().unwrap();

    // Assert
    assert!(result.is_valid(), "{:?}", result.diagnostics());
}

#[test]
fn given_right_bound_past_parent_when_verified_then_gap_and_containment_are_reported() {
    // Arrange
    let mut session = session();
    let (a, children) = parent_with_children(&mut session, &["B"]);
    let b = children[0];
    session.store_mut().get_mut(b).unwrap().right = 5;
    let node = session.store().view(b).unwrap().key();
    let parent = session.store().view(a).unwrap().key();

    // Act
    let result = session.verify().unwrap();

    // Assert
    assert_eq!(
        result.diagnostics(),
        &[
            Diagnostic::Missing(3),
            Diagnostic::OutsideParent { node, parent },
        ]
    );
    assert_eq!(result.diagnostics()[0].to_string(), "index [3], missing");
}

#[test]
fn given_shared_left_bound_when_verified_then_duplicate_is_reported() {
    // Arrange
    let mut session = session();
    let (_, children) = parent_with_children(&mut session, &["B"]);
    let b = children[0];
    session.store_mut().get_mut(b).unwrap().left = 1;

    // Act
    let result = session.verify().unwrap();

    // Assert
    let diagnostics = result.diagnostics();
    assert_eq!(diagnostics[0], Diagnostic::Duplicate(1));
    assert_eq!(diagnostics[1], Diagnostic::Missing(2));
    assert_eq!(diagnostics[0].to_string(), "index [1], duplicate");
}

#[test]
fn given_parent_pointer_to_deleted_row_when_verified_then_dangling_parent_is_reported() {
    // Arrange
    let mut session = session();
    let (_, b, _) = two_roots_one_child(&mut session);
    let ghost = session.store_mut().create(Category::new("ghost"));
    session.store_mut().delete(ghost).unwrap();
    session.store_mut().get_mut(b).unwrap().parent = Some(ghost);
    let node = session.store().view(b).unwrap().key();

    // Act
    let result = session.verify().unwrap();

    // Assert
    assert_eq!(
        result.diagnostics(),
        &[Diagnostic::DanglingParent { node, parent: ghost }]
    );
}

#[test]
fn given_root_inside_other_interval_when_verified_then_nested_root_and_stale_caches_are_reported() {
    // Arrange
    let mut session = session();
    let (a, b, _) = two_roots_one_child(&mut session);
    session.store_mut().get_mut(b).unwrap().parent = None;
    let node = session.store().view(b).unwrap().key();
    let container = session.store().view(a).unwrap().key();

    // Act
    let result = session.verify().unwrap();

    // Assert
    assert_eq!(
        result.diagnostics(),
        &[
            Diagnostic::NestedRoot { node, container },
            Diagnostic::LevelMismatch {
                node,
                expected: 0,
                actual: Some(1),
            },
            Diagnostic::RootMismatch {
                node,
                expected: b,
                actual: Some(a),
            },
        ]
    );
}

#[test]
fn given_stale_level_when_verified_then_level_mismatch_is_reported() {
    let mut session = session();
    let (_, b, _) = two_roots_one_child(&mut session);
    session.store_mut().get_mut(b).unwrap().level = 5;

    let result = session.verify().unwrap();

    assert!(matches!(
        result.diagnostics(),
        [Diagnostic::LevelMismatch {
            expected: 1,
            actual: Some(5),
            ..
        }]
    ));
}

#[test]
fn given_half_assigned_root_when_verified_then_invalid_bounds_are_reported_and_recover_repairs_it() {
    // Arrange
    let mut session = session();
    let (_, _, c) = two_roots_one_child(&mut session);
    session.store_mut().get_mut(c).unwrap().right = 0;
    let node = session.store().view(c).unwrap().key();

    // Act
    let result = session.verify().unwrap();

    // Assert
    assert_eq!(
        result.diagnostics(),
        &[Diagnostic::InvalidBounds {
            node,
            left: 5,
            right: 0,
        }]
    );
    assert_eq!(
        result.diagnostics()[0].to_string(),
        format!("node [{node}], bounds (5, 0) are not a valid interval")
    );
    assert_eq!(session.recover().unwrap(), 1);
    assert_eq!(bounds(&session, c), (5, 6));
    assert!(session.verify().unwrap().is_valid());
}

#[rstest]
#[case::zero_left(0)]
#[case::negative_left(-2)]
fn given_non_positive_left_when_verified_then_freed_index_and_invalid_bounds_are_reported(
    #[case] left: i64,
) {
    // Arrange
    let mut session = session();
    let (_, _, c) = two_roots_one_child(&mut session);
    session.store_mut().get_mut(c).unwrap().left = left;
    let node = session.store().view(c).unwrap().key();

    // Act
    let result = session.verify().unwrap();

    // Assert
    assert_eq!(
        result.diagnostics(),
        &[
            Diagnostic::Missing(5),
            Diagnostic::InvalidBounds { node, left, right: 6 },
        ]
    );
}

#[test]
fn given_far_out_right_bound_when_verified_then_gap_is_reported_as_one_range() {
    // Arrange
    let mut session = session();
    let (_, _, c) = two_roots_one_child(&mut session);
    session.store_mut().get_mut(c).unwrap().right = 1_000_000_000_000;

    // Act
    let result = session.verify().unwrap();

    // Assert
    assert_eq!(
        result.diagnostics(),
        &[Diagnostic::MissingRange {
            from: 6,
            to: 999_999_999_999,
        }]
    );
    assert_eq!(
        result.diagnostics()[0].to_string(),
        "index [6..999999999999], missing"
    );
}

// ============================================================
// Recover
// ============================================================

#[test]
fn given_scrambled_bounds_when_recovered_then_siblings_keep_left_order() {
    // Arrange
    let mut session = session();
    let (p, children) = parent_with_children(&mut session, &["X", "Y"]);
    let (x, y) = (children[0], children[1]);
    {
        let store = session.store_mut();
        let parent = store.get_mut(p).unwrap();
        parent.right = 20;
        let x = store.get_mut(x).unwrap();
        x.left = 10;
        x.right = 11;
    }
    assert!(!session.verify().unwrap().is_valid());

    // Act
    let changed = session.recover().unwrap();

    // Assert
    assert_eq!(changed, 3);
    assert_eq!(bounds(&session, p), (1, 6));
    assert_eq!(bounds(&session, y), (2, 3));
    assert_eq!(bounds(&session, x), (4, 5));
    assert!(session.verify().unwrap().is_valid());
}

#[test]
fn given_parent_cycle_when_recovered_then_cycle_is_cut_at_first_node() {
    // Arrange
    let mut session = session();
    let (a, b, c) = two_roots_one_child(&mut session);
    session.store_mut().get_mut(a).unwrap().parent = Some(b);

    // Act
    session.recover().unwrap();

    // Assert
    assert_eq!(session.store().get(a).unwrap().parent, None);
    assert_eq!(bounds(&session, a), (1, 4));
    assert_eq!(bounds(&session, b), (2, 3));
    assert_eq!(bounds(&session, c), (5, 6));
    assert!(session.verify().unwrap().is_valid());
}

#[test]
fn given_dangling_parent_when_recovered_then_node_becomes_a_root() {
    // Arrange
    let mut session = session();
    let (a, b, c) = two_roots_one_child(&mut session);
    let ghost = session.store_mut().create(Category::new("ghost"));
    session.store_mut().delete(ghost).unwrap();
    session.store_mut().get_mut(b).unwrap().parent = Some(ghost);

    // Act
    session.recover().unwrap();

    // Assert
    assert_eq!(session.store().get(b).unwrap().parent, None);
    assert_eq!(bounds(&session, a), (1, 2));
    assert_eq!(bounds(&session, b), (3, 4));
    assert_eq!(bounds(&session, c), (5, 6));
    assert_eq!(level(&session, b), Some(0));
    assert!(session.verify().unwrap().is_valid());
}

#[test]
fn given_consistent_tree_when_recovered_then_nothing_is_rewritten() {
    let mut session = session();
    two_roots_one_child(&mut session);

    assert_eq!(session.recover().unwrap(), 0);
}

#[test]
fn given_damaged_tree_when_planning_then_store_is_untouched() {
    // Arrange
    let mut session = session();
    let (a, b, _) = two_roots_one_child(&mut session);
    session.store_mut().get_mut(b).unwrap().level = 7;

    // Act
    let plan = session.plan_recovery().unwrap();

    // Assert
    let placement = plan.iter().find(|p| p.handle == b).unwrap();
    assert_eq!((placement.left, placement.right, placement.level), (2, 3, 1));
    assert_eq!(placement.root, a);
    assert_eq!(level(&session, b), Some(7));
}
