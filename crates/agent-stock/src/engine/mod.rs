//! Analysis workflow engine
//!
//! Phase machine, per-run state, dimension node execution and the driver
//! that sequences them.

pub mod graph;
mod node;
pub mod state;
pub mod workflow;

pub use graph::{Phase, PhaseEvent, Transition, WorkflowGraph, workflow_graph};
pub use state::{
    DimensionOutput, DimensionPayload, ErrorEntry, ErrorKind, NodeId, NodeResult, Origin,
    Severity, WorkflowState,
};
pub use workflow::{RunRequest, WorkflowEngine, WorkflowRun};

pub(crate) use node::with_timeout;
