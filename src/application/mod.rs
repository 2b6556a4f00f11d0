//! Application layer: the tree engine
//!
//! This layer orchestrates domain rules and depends on the persistence boundary trait.

pub mod error;
pub mod services;

pub use error::{ApplicationError, ApplicationResult};
