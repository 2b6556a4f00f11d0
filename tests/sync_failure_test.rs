//! Integration tests for storage failures in the middle of structural operations
//!
//! A wrapper store rejects the n-th bulk shift; every multi-statement operation
//! must then leave the stored numbering exactly as it found it.

mod common;

use common::{bounds, registry, session, two_roots_one_child, FailingStore};
use nestree::application::ApplicationError;
use nestree::domain::{Category, NodeHandle, Steps};
use nestree::infrastructure::error::StoreError;
use nestree::infrastructure::traits::PersistenceAdapter;
use nestree::infrastructure::{InfraError, MemoryStore, Session};

type FailingSession = Session<FailingStore<MemoryStore<Category>>>;

/// A=(1,4), B=(2,3), C=(5,6) behind a store failing at shift `fail_at`.
fn failing_session(fail_at: usize) -> (FailingSession, [NodeHandle; 3]) {
    let mut session = session();
    let (a, b, c) = two_roots_one_child(&mut session);
    let store = FailingStore::new(session.into_store(), fail_at);
    (Session::open(store, &registry()).unwrap(), [a, b, c])
}

fn all_bounds(session: &FailingSession, handles: &[NodeHandle]) -> Vec<(i64, i64)> {
    handles.iter().map(|&h| bounds(session, h)).collect()
}

#[test]
fn given_failing_shift_when_moving_immediately_then_tree_sync_error_and_no_change() {
    // Arrange
    let (mut session, handles) = failing_session(3);
    let [_, b, c] = handles;
    let before = all_bounds(&session, &handles);

    // Act
    let result = session.move_to(b, Some(c));

    // Assert
    match result {
        Err(ApplicationError::TreeSync { operation, source }) => {
            assert_eq!(operation, "reparent");
            assert!(matches!(source, StoreError::Rejected { .. }));
        }
        other => panic!("expected TreeSync, got {other:?}"),
    }
    assert_eq!(all_bounds(&session, &handles), before);
    assert_eq!(session.store().inner.get(b).unwrap().parent, Some(handles[0]));
    assert_eq!(session.store().transaction_depth(), 0);
}

#[test]
fn given_failing_shift_when_flushing_parent_change_then_whole_batch_rolls_back() {
    // Arrange
    let (mut session, handles) = failing_session(2);
    let [a, b, c] = handles;
    let before = all_bounds(&session, &handles);

    // Act
    session.set_parent(b, Some(c)).unwrap();
    let result = session.flush();

    // Assert
    assert!(matches!(
        result,
        Err(InfraError::Application(ApplicationError::TreeSync { .. }))
    ));
    assert_eq!(all_bounds(&session, &handles), before);
    assert!(!session.is_dirty());
    assert!(session.listener().batch().is_settled());

    // the session stays usable once the store recovers
    session.store_mut().heal();
    session.move_to(b, Some(c)).unwrap();
    assert_eq!(bounds(&session, a), (1, 2));
    assert_eq!(bounds(&session, b), (4, 5));
}

#[test]
fn given_failing_shift_when_removing_then_row_survives() {
    // Arrange
    let (mut session, handles) = failing_session(1);
    let [a, b, _] = handles;
    let before = all_bounds(&session, &handles);

    // Act
    session.remove(a).unwrap();
    let result = session.flush();

    // Assert
    assert!(result.is_err());
    assert!(session.store().get(a).is_some());
    assert_eq!(session.store().inner.get(b).unwrap().parent, Some(a));
    assert_eq!(all_bounds(&session, &handles), before);
}

#[test]
fn given_failing_shift_when_swapping_siblings_then_order_is_kept() {
    // Arrange
    let (mut session, handles) = failing_session(2);
    let [_, _, c] = handles;
    let before = all_bounds(&session, &handles);

    // Act
    let result = session.move_up(c, Steps::By(1));

    // Assert
    assert!(matches!(
        result,
        Err(ApplicationError::TreeSync {
            operation: "reorder",
            ..
        })
    ));
    assert_eq!(all_bounds(&session, &handles), before);
}

#[test]
fn given_failing_shift_when_child_attaches_during_flush_then_inserts_are_dropped() {
    // Arrange
    let (mut session, handles) = failing_session(1);
    let [a, _, _] = handles;

    // Act
    let d = session.persist(Category::child_of("D", a)).unwrap();
    let result = session.flush();

    // Assert
    assert!(result.is_err());
    assert!(session.store().get(d).is_none());
    assert_eq!(bounds(&session, a), (1, 4));
}
