//! Workflow phases and their transition table

use super::state::NodeId;
use agent_workflow::WorkflowError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow-level phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Validation,
    Preparation,
    Analysis,
    ErrorHandling,
    Compilation,
    Done,
    Failed,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Apply `event`, or report that the table has no such edge
    pub fn on(self, event: PhaseEvent) -> Result<Phase, WorkflowError> {
        TRANSITIONS
            .iter()
            .find(|t| t.from == self && t.event == event)
            .map(|t| t.to)
            .ok_or_else(|| WorkflowError::NoTransition {
                from: format!("{self:?}"),
                event: format!("{event:?}"),
            })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Something that moves the workflow between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseEvent {
    Validated,
    Prepared,
    AnalysisComplete,
    Compiled,
    /// A node failed; the error is recorded before deciding how to continue
    NodeFailed,
    /// A non-fatal failure was recorded; normal flow resumes
    Recovered,
    /// A fatal failure ends the run
    Abort,
    Cancel,
}

/// One edge of the phase machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Phase,
    pub event: PhaseEvent,
    pub to: Phase,
}

const fn edge(from: Phase, event: PhaseEvent, to: Phase) -> Transition {
    Transition { from, event, to }
}

/// Every legal phase change
pub const TRANSITIONS: &[Transition] = &[
    edge(Phase::Validation, PhaseEvent::Validated, Phase::Preparation),
    edge(Phase::Validation, PhaseEvent::NodeFailed, Phase::ErrorHandling),
    edge(Phase::Preparation, PhaseEvent::Prepared, Phase::Analysis),
    edge(Phase::Analysis, PhaseEvent::NodeFailed, Phase::ErrorHandling),
    edge(Phase::Analysis, PhaseEvent::AnalysisComplete, Phase::Compilation),
    edge(Phase::ErrorHandling, PhaseEvent::Recovered, Phase::Analysis),
    edge(Phase::ErrorHandling, PhaseEvent::Abort, Phase::Failed),
    edge(Phase::Compilation, PhaseEvent::Compiled, Phase::Done),
    edge(Phase::Validation, PhaseEvent::Cancel, Phase::Cancelled),
    edge(Phase::Preparation, PhaseEvent::Cancel, Phase::Cancelled),
    edge(Phase::Analysis, PhaseEvent::Cancel, Phase::Cancelled),
    edge(Phase::ErrorHandling, PhaseEvent::Cancel, Phase::Cancelled),
    edge(Phase::Compilation, PhaseEvent::Cancel, Phase::Cancelled),
];

/// Static description of the workflow for visualisation layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub nodes: Vec<NodeId>,
    /// Data-flow edges between nodes
    pub edges: Vec<(NodeId, NodeId)>,
    pub phases: Vec<Phase>,
    pub transitions: Vec<Transition>,
}

/// Describe the node graph and phase machine
pub fn workflow_graph() -> WorkflowGraph {
    let mut edges = vec![(NodeId::Validation, NodeId::Preparation)];
    for node in NodeId::DIMENSIONS {
        edges.push((NodeId::Preparation, node));
        edges.push((node, NodeId::Compilation));
    }

    WorkflowGraph {
        nodes: NodeId::ALL.to_vec(),
        edges,
        phases: vec![
            Phase::Validation,
            Phase::Preparation,
            Phase::Analysis,
            Phase::ErrorHandling,
            Phase::Compilation,
            Phase::Done,
            Phase::Failed,
            Phase::Cancelled,
        ],
        transitions: TRANSITIONS.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let phase = Phase::Validation
            .on(PhaseEvent::Validated)
            .and_then(|p| p.on(PhaseEvent::Prepared))
            .and_then(|p| p.on(PhaseEvent::AnalysisComplete))
            .and_then(|p| p.on(PhaseEvent::Compiled))
            .unwrap();
        assert_eq!(phase, Phase::Done);
    }

    #[test]
    fn test_error_handling_routes() {
        let recovered = Phase::Analysis
            .on(PhaseEvent::NodeFailed)
            .and_then(|p| p.on(PhaseEvent::Recovered))
            .unwrap();
        assert_eq!(recovered, Phase::Analysis);

        let aborted = Phase::Validation
            .on(PhaseEvent::NodeFailed)
            .and_then(|p| p.on(PhaseEvent::Abort))
            .unwrap();
        assert_eq!(aborted, Phase::Failed);
    }

    #[test]
    fn test_terminal_phases_accept_nothing() {
        for phase in [Phase::Done, Phase::Failed, Phase::Cancelled] {
            assert!(phase.is_terminal());
            assert!(phase.on(PhaseEvent::Cancel).is_err());
            assert!(phase.on(PhaseEvent::Validated).is_err());
        }
    }

    #[test]
    fn test_cannot_skip_preparation() {
        assert!(matches!(
            Phase::Validation.on(PhaseEvent::AnalysisComplete),
            Err(WorkflowError::NoTransition { .. })
        ));
    }

    #[test]
    fn test_graph_shape() {
        let graph = workflow_graph();
        assert_eq!(graph.nodes.len(), 8);
        assert_eq!(graph.edges.len(), 11);
        assert_eq!(graph.transitions.len(), TRANSITIONS.len());

        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["edges"][0], serde_json::json!(["validation", "preparation"]));
    }
}
