//! Workflow error types

use crate::NodeStatus;
use thiserror::Error;

/// Errors raised by workflow bookkeeping
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// A node status change that the transition table does not allow
    #[error("Illegal transition for node {node}: {from:?} -> {to:?}")]
    IllegalTransition {
        node: String,
        from: NodeStatus,
        to: NodeStatus,
    },

    /// A workflow-level event that the current phase does not accept
    #[error("No transition from {from} on {event}")]
    NoTransition { from: String, event: String },

    /// The slot was already finalized; the late result is discarded
    #[error("Node {0} is already finalized")]
    SlotFinalized(String),

    /// Node is not part of this workflow
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// The run was cancelled
    #[error("Workflow cancelled")]
    Cancelled,
}

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;
