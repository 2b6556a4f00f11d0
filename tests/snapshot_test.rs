//! Integration tests for snapshot files and the command layer on top of them

use std::fs;
use std::path::Path;

use clap::Parser;
use tempfile::TempDir;

use nestree::cli::commands::execute;
use nestree::cli::Cli;
use nestree::config::Settings;
use nestree::domain::Category;
use nestree::exitcode;
use nestree::infrastructure::di::ServiceContainer;
use nestree::infrastructure::snapshot::{self, Snapshot};
use nestree::infrastructure::traits::PersistenceAdapter;
use nestree::util::testing;

fn container() -> ServiceContainer {
    testing::init_test_setup();
    ServiceContainer::new(Settings::default()).unwrap()
}

fn run(container: &ServiceContainer, file: &Path, args: &[&str]) -> i32 {
    let mut argv = vec!["nestree", "--file", file.to_str().unwrap()];
    argv.extend_from_slice(args);
    execute(&Cli::parse_from(argv), container).unwrap()
}

fn node_bounds(file: &Path, title: &str) -> (i64, i64) {
    let snapshot = Snapshot::read(file).unwrap();
    let node = snapshot.nodes.iter().find(|n| n.title == title).unwrap();
    (node.left, node.right)
}

// ============================================================
// Snapshot round trip
// ============================================================

#[test]
fn given_flushed_session_when_saved_and_loaded_then_forest_is_identical() {
    // Arrange
    let container = container();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shop.toml");
    let mut session = container.session(&path, "category").unwrap();
    let food = session.persist(Category::new("Food")).unwrap();
    session.persist(Category::child_of("Fruit", food)).unwrap();
    session.persist(Category::new("Tools")).unwrap();
    session.flush().unwrap();

    // Act
    snapshot::save(session.store(), &path).unwrap();
    let mut reloaded = container.session(&path, "category").unwrap();

    // Assert
    assert_eq!(Snapshot::capture(reloaded.store()).unwrap(), Snapshot::capture(session.store()).unwrap());
    assert!(reloaded.verify().unwrap().is_valid());
    assert_eq!(node_bounds(&path, "Tools"), (5, 6));

    // identifiers continue after the loaded ones
    reloaded.persist(Category::new("Garden")).unwrap();
    let ids = reloaded.flush().unwrap();
    assert_eq!(ids[0].1, 4);
}

#[test]
fn given_missing_file_when_session_opened_then_store_is_empty() {
    let container = container();
    let dir = TempDir::new().unwrap();

    let session = container.session(&dir.path().join("none.toml"), "category").unwrap();

    assert!(session.store().select_all().unwrap().is_empty());
}

#[test]
fn given_unregistered_tree_when_session_opened_then_error_before_reading() {
    let container = container();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "not toml [").unwrap();

    let err = container.session(&path, "menu").err().unwrap();

    assert_eq!(err.to_string(), "tree 'menu' is not registered");
}

// ============================================================
// Commands
// ============================================================

#[test]
fn given_commands_when_run_in_sequence_then_snapshot_tracks_every_change() {
    // Arrange
    let container = container();
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("shop.toml");

    // Act + Assert
    assert_eq!(run(&container, &file, &["add", "A"]), exitcode::OK);
    assert_eq!(run(&container, &file, &["add", "B", "--parent", "1"]), exitcode::OK);
    assert_eq!(run(&container, &file, &["add", "C"]), exitcode::OK);
    assert_eq!(node_bounds(&file, "A"), (1, 4));
    assert_eq!(node_bounds(&file, "C"), (5, 6));

    assert_eq!(run(&container, &file, &["move", "2", "--parent", "3"]), exitcode::OK);
    assert_eq!(node_bounds(&file, "A"), (1, 2));
    assert_eq!(node_bounds(&file, "C"), (3, 6));
    assert_eq!(node_bounds(&file, "B"), (4, 5));

    assert_eq!(run(&container, &file, &["up", "3"]), exitcode::OK);
    assert_eq!(node_bounds(&file, "C"), (1, 4));
    assert_eq!(node_bounds(&file, "A"), (5, 6));

    assert_eq!(run(&container, &file, &["remove", "3"]), exitcode::OK);
    assert_eq!(node_bounds(&file, "B"), (1, 2));
    assert_eq!(node_bounds(&file, "A"), (3, 4));
    assert_eq!(run(&container, &file, &["verify"]), exitcode::OK);
}

#[test]
fn given_damaged_snapshot_when_verified_then_dataerr_until_recovered() {
    // Arrange
    let container = container();
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("damaged.toml");
    fs::write(
        &file,
        r#"
[[node]]
id = 1
title = "Food"
left = 1
right = 9

[[node]]
id = 2
title = "Fruit"
parent = 1
left = 2
right = 3
level = 1
"#,
    )
    .unwrap();

    // Act + Assert
    assert_eq!(run(&container, &file, &["verify"]), exitcode::DATAERR);
    assert_eq!(run(&container, &file, &["recover", "--dry-run"]), exitcode::OK);
    assert_eq!(node_bounds(&file, "Food"), (1, 9));

    assert_eq!(run(&container, &file, &["recover"]), exitcode::OK);
    assert_eq!(node_bounds(&file, "Food"), (1, 4));
    assert_eq!(run(&container, &file, &["verify"]), exitcode::OK);
}

#[test]
fn given_unknown_id_when_removing_then_usage_error() {
    let container = container();
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("shop.toml");

    let cli = Cli::parse_from(["nestree", "--file", file.to_str().unwrap(), "remove", "42"]);
    let err = execute(&cli, &container).unwrap_err();

    assert_eq!(err.exit_code(), exitcode::USAGE);
}
