//! Application services
//!
//! The nested-set engine: the core operations on one store, the batch
//! coordinator, and the services built on top of them. Services depend on the
//! [`PersistenceAdapter`](crate::infrastructure::traits::PersistenceAdapter)
//! boundary trait but are themselves concrete.

pub mod batch;
pub mod lifecycle;
pub mod range_tree;
pub mod reorder;
pub mod verifier;

pub use batch::BatchCoordinator;
pub use lifecycle::{FlushBatch, NestedSetListener, TreeLifecycle};
pub use range_tree::RangeTree;
pub use reorder::{move_sibling, Direction};
pub use verifier::{Diagnostic, Verification};
