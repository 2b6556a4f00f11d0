//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::{NodeHandle, NodeKey};

/// Raised once when a node type is registered; fatal until the mapping is fixed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("tree '{node_type}' has no left field mapped")]
    MissingLeftField { node_type: String },

    #[error("tree '{node_type}' has no right field mapped")]
    MissingRightField { node_type: String },

    #[error("tree '{node_type}' has no parent field mapped")]
    MissingParentField { node_type: String },

    #[error("parent field of tree '{node_type}' points at '{target}', expected the same type")]
    ParentFieldNotRelated { node_type: String, target: String },

    #[error("invalid removal mode '{value}' for tree '{node_type}' (expected promote or cascade)")]
    InvalidRemovalMode { node_type: String, value: String },

    #[error("tree '{0}' is not registered")]
    NotRegistered(String),

    #[error("store holds '{store}' nodes but tree '{node_type}' was requested")]
    TypeMismatch { node_type: String, store: String },
}

/// Domain errors represent structural rule violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    #[error("node not found: {0}")]
    NodeNotFound(NodeHandle),

    #[error("cannot move node {node} under its own descendant {parent}")]
    CycleDetected { node: NodeKey, parent: NodeKey },

    #[error("parent {0} has no position yet")]
    ParentNotPositioned(NodeKey),

    #[error("node {node} waits for parent {parent} which was never persisted")]
    UnresolvedParent { node: NodeHandle, parent: NodeHandle },
}
