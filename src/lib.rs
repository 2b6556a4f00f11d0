//! nestree: nested-set tree maintenance
//!
//! Keeps the left/right interval numbering of a forest consistent while a
//! persistence layer defers identifier assignment and batches writes.
//!
//! Layers, innermost first:
//! - [`domain`]: node references, range predicates, registry, errors
//! - [`application`]: the engine (core operations, batch coordination,
//!   verification, reordering, lifecycle listener)
//! - [`infrastructure`]: persistence adapters, unit of work, snapshots
//! - [`cli`]: the `nestree` command line tool

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
