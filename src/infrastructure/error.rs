//! Infrastructure-level errors

use std::path::PathBuf;

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::{ConfigurationError, NodeHandle};

/// Failure reported by a persistence adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no node at {0}")]
    NodeNotFound(NodeHandle),

    #[error("node {0} was already inserted")]
    AlreadyInserted(NodeHandle),

    #[error("commit or rollback without an open transaction")]
    NoTransaction,

    #[error("statement rejected: {statement}: {reason}")]
    Rejected { statement: String, reason: String },
}

/// Result type for persistence adapter calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Infrastructure errors wrap application errors and add I/O-level concerns.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot {path}: {message}")]
    Snapshot { path: PathBuf, message: String },
}

impl InfraError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<ConfigurationError> for InfraError {
    fn from(err: ConfigurationError) -> Self {
        Self::Application(err.into())
    }
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;
