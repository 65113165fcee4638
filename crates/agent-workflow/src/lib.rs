//! Workflow execution primitives for agent-rs
//!
//! This crate provides the pieces a multi-node workflow is assembled from:
//! per-node status tracking with checked transitions, result slots that can
//! be finalized exactly once, retry with exponential backoff, cooperative
//! cancellation, and a dispatcher that runs independent nodes either
//! sequentially or concurrently.

pub mod error;
pub mod retry;
pub mod scheduler;
pub mod slots;
pub mod status;

// Re-export for convenience
pub use error::{Result, WorkflowError};
pub use retry::{RetryPolicy, Retryable};
pub use scheduler::{
    CancelHandle, CancellationSignal, ExecutionMode, NodeEvent, cancellation, dispatch,
};
pub use slots::{NodeSlots, Slot};
pub use status::NodeStatus;
