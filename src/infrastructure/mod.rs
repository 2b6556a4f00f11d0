//! Infrastructure layer: persistence adapters, unit of work and DI container
//!
//! This layer implements the persistence boundary trait and wires up services.

pub mod di;
pub mod error;
pub mod memory;
pub mod session;
pub mod snapshot;
pub mod traits;

pub use error::{InfraError, InfraResult, StoreError, StoreResult};
pub use memory::MemoryStore;
pub use session::Session;
