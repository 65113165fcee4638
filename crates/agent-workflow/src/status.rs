//! Node status and its transition table

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a single workflow node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

impl NodeStatus {
    /// Statuses reachable from `self` in one step
    pub fn allowed_transitions(self) -> &'static [NodeStatus] {
        use NodeStatus::{Done, Failed, Pending, Running, Skipped};
        match self {
            Pending => &[Running, Skipped],
            Running => &[Done, Failed],
            Done | Failed | Skipped => &[],
        }
    }

    /// Whether the node has finished, one way or another
    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    pub fn can_transition_to(self, next: NodeStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
