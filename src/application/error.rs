//! Application-level errors (wraps domain and store errors)

use thiserror::Error;

use crate::domain::{ConfigurationError, DomainError};
use crate::infrastructure::error::StoreError;

/// Errors surfaced by the tree engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// A statement of a structural operation failed; its scope was rolled back.
    #[error("tree sync failed during {operation}: {source}")]
    TreeSync {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// A read-dependent operation was issued while inserts are still pending.
    #[error("{operation} deferred: {pending} insert(s) pending in the current batch")]
    OperationDeferred {
        operation: &'static str,
        pending: usize,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<ConfigurationError> for ApplicationError {
    fn from(err: ConfigurationError) -> Self {
        Self::Domain(DomainError::Configuration(err))
    }
}

impl ApplicationError {
    /// Wrap a store failure of `operation`.
    pub fn sync(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::TreeSync { operation, source }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::OperationDeferred { .. })
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
