//! Integration tests for MoveUp / MoveDown

mod common;

use common::{bounds, parent_with_children, session};
use nestree::domain::{Category, Steps};
use rstest::rstest;

#[test]
fn given_two_siblings_when_first_moved_down_then_they_swap() {
    // Arrange
    let mut session = session();
    let (p, children) = parent_with_children(&mut session, &["X", "Y"]);
    let (x, y) = (children[0], children[1]);

    // Act
    let swaps = session.move_down(x, Steps::By(1)).unwrap();

    // Assert
    assert_eq!(swaps, 1);
    assert_eq!(bounds(&session, p), (1, 6));
    assert_eq!(bounds(&session, y), (2, 3));
    assert_eq!(bounds(&session, x), (4, 5));
    assert!(session.verify().unwrap().is_valid());
}

#[test]
fn given_two_siblings_when_last_moved_up_then_they_swap() {
    let mut session = session();
    let (_, children) = parent_with_children(&mut session, &["X", "Y"]);
    let (x, y) = (children[0], children[1]);

    let swaps = session.move_up(y, Steps::By(1)).unwrap();

    assert_eq!(swaps, 1);
    assert_eq!(bounds(&session, y), (2, 3));
    assert_eq!(bounds(&session, x), (4, 5));
}

#[rstest]
#[case::first_up(0, true)]
#[case::last_down(2, false)]
fn given_node_at_boundary_when_moved_past_it_then_nothing_happens(#[case] index: usize, #[case] up: bool) {
    // Arrange
    let mut session = session();
    let (_, children) = parent_with_children(&mut session, &["X", "Y", "Z"]);
    let before: Vec<_> = children.iter().map(|&h| bounds(&session, h)).collect();

    // Act
    let swaps = if up {
        session.move_up(children[index], Steps::By(1)).unwrap()
    } else {
        session.move_down(children[index], Steps::By(1)).unwrap()
    };

    // Assert
    assert_eq!(swaps, 0);
    let after: Vec<_> = children.iter().map(|&h| bounds(&session, h)).collect();
    assert_eq!(before, after);
}

#[test]
fn given_last_of_three_when_moved_up_to_end_then_it_becomes_first() {
    // Arrange
    let mut session = session();
    let (_, children) = parent_with_children(&mut session, &["X", "Y", "Z"]);
    let (x, y, z) = (children[0], children[1], children[2]);

    // Act
    let swaps = session.move_up(z, Steps::ToEnd).unwrap();

    // Assert
    assert_eq!(swaps, 2);
    assert_eq!(bounds(&session, z), (2, 3));
    assert_eq!(bounds(&session, x), (4, 5));
    assert_eq!(bounds(&session, y), (6, 7));
}

#[test]
fn given_more_steps_than_siblings_when_moved_then_it_stops_at_the_end() {
    let mut session = session();
    let (_, children) = parent_with_children(&mut session, &["X", "Y", "Z"]);

    let swaps = session.move_down(children[0], Steps::By(5)).unwrap();

    assert_eq!(swaps, 2);
    assert_eq!(bounds(&session, children[0]), (6, 7));
}

#[test]
fn given_siblings_with_children_when_swapped_then_subtrees_move_whole() {
    // Arrange
    let mut session = session();
    let p = session.persist(Category::new("P")).unwrap();
    let x = session.persist(Category::child_of("X", p)).unwrap();
    let x1 = session.persist(Category::child_of("X1", x)).unwrap();
    let y = session.persist(Category::child_of("Y", p)).unwrap();
    let y1 = session.persist(Category::child_of("Y1", y)).unwrap();
    session.flush().unwrap();
    assert_eq!(bounds(&session, p), (1, 10));

    // Act
    let swaps = session.move_down(x, Steps::By(1)).unwrap();

    // Assert
    assert_eq!(swaps, 1);
    assert_eq!(bounds(&session, y), (2, 5));
    assert_eq!(bounds(&session, y1), (3, 4));
    assert_eq!(bounds(&session, x), (6, 9));
    assert_eq!(bounds(&session, x1), (7, 8));
    assert!(session.verify().unwrap().is_valid());
}

#[test]
fn given_roots_when_moved_then_they_reorder_among_roots() {
    // Arrange
    let mut session = session();
    let a = session.persist(Category::new("A")).unwrap();
    let b = session.persist(Category::child_of("B", a)).unwrap();
    let c = session.persist(Category::new("C")).unwrap();
    session.flush().unwrap();

    // Act
    let swaps = session.move_up(c, Steps::By(1)).unwrap();

    // Assert
    assert_eq!(swaps, 1);
    assert_eq!(bounds(&session, c), (1, 2));
    assert_eq!(bounds(&session, a), (3, 6));
    assert_eq!(bounds(&session, b), (4, 5));
    assert!(session.verify().unwrap().is_valid());
}
