//! Domain layer: entities and structural rules
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod bounds;
pub mod category;
pub mod entities;
pub mod error;
pub mod registry;
pub mod tree_traits;

pub use arena::{TreeArena, TreeNode, Visit};
pub use bounds::HasTreeBounds;
pub use category::Category;
pub use entities::*;
pub use error::{ConfigurationError, DomainError};
pub use registry::{TreeMapping, TreeMeta, TreeRegistry};
pub use tree_traits::{forest_from_views, TreeNodeConvert};
