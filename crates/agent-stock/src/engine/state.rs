//! Per-run workflow state
//!
//! One [`WorkflowState`] is owned by the engine for the duration of a run.
//! Every node writes only to its own slot; the error log is appended from
//! the single place that consumes node events.

use super::graph::{Phase, PhaseEvent};
use crate::dimension::Dimension;
use crate::knowledge::Retrieval;
use crate::scoring::{Recommendation, ScoreRecord};
use agent_workflow::{NodeSlots, NodeStatus, WorkflowError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;
use uuid::Uuid;

/// Workflow node identifier, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Validation,
    Preparation,
    CashFlow,
    Profit,
    Leadership,
    Technology,
    Sentiment,
    Compilation,
}

impl NodeId {
    pub const ALL: [NodeId; 8] = [
        NodeId::Validation,
        NodeId::Preparation,
        NodeId::CashFlow,
        NodeId::Profit,
        NodeId::Leadership,
        NodeId::Technology,
        NodeId::Sentiment,
        NodeId::Compilation,
    ];

    pub const DIMENSIONS: [NodeId; 5] = [
        NodeId::CashFlow,
        NodeId::Profit,
        NodeId::Leadership,
        NodeId::Technology,
        NodeId::Sentiment,
    ];

    pub fn dimension(self) -> Option<Dimension> {
        match self {
            Self::CashFlow => Some(Dimension::CashFlow),
            Self::Profit => Some(Dimension::Profit),
            Self::Leadership => Some(Dimension::Leadership),
            Self::Technology => Some(Dimension::Technology),
            Self::Sentiment => Some(Dimension::Sentiment),
            Self::Validation | Self::Preparation | Self::Compilation => None,
        }
    }
}

impl From<Dimension> for NodeId {
    fn from(dimension: Dimension) -> Self {
        match dimension {
            Dimension::CashFlow => Self::CashFlow,
            Dimension::Profit => Self::Profit,
            Dimension::Leadership => Self::Leadership,
            Dimension::Technology => Self::Technology,
            Dimension::Sentiment => Self::Sentiment,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a dimension node stores in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionPayload {
    pub score: ScoreRecord,
    pub narrative: String,
    pub metrics: serde_json::Value,
    pub computed_at: DateTime<Utc>,
}

/// Where a dimension result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Computed,
    FreshCache,
    /// Outdated cache entry used after the fresh computation failed
    StaleCache,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionOutput {
    pub payload: DimensionPayload,
    pub origin: Origin,
}

/// Result stored in a node slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeResult {
    Validated {
        ticker: String,
        company_name: String,
    },
    Prepared {
        /// Number of dimensions that received context
        dimensions: usize,
        entries: usize,
    },
    Dimension(DimensionOutput),
    Compiled {
        weighted_score: Option<f64>,
        recommendation: Option<Recommendation>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    DataUnavailable,
    TransientIo,
    CapabilityUnavailable,
    Persistence,
    Cancelled,
}

/// One entry of the run's error log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub node: NodeId,
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
    /// 1-based attempt number for collaborator failures
    pub attempt: Option<u32>,
}

impl ErrorEntry {
    pub fn new(node: NodeId, severity: Severity, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            node,
            severity,
            kind,
            message: message.into(),
            attempt: None,
        }
    }

    pub fn warning(node: NodeId, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(node, Severity::Warning, kind, message)
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }
}

/// State of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub run_id: Uuid,
    pub ticker: String,
    pub company_name: Option<String>,
    pub phase: Phase,
    /// Every phase entered, starting with `Validation`
    pub phase_history: Vec<Phase>,
    pub nodes: NodeSlots<NodeId, NodeResult>,
    pub errors: Vec<ErrorEntry>,
    pub retrieved_context: BTreeMap<Dimension, Retrieval>,
    /// Investment-framework context retrieved for compilation
    pub framework_context: Option<Retrieval>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowState {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            ticker: ticker.into(),
            company_name: None,
            phase: Phase::Validation,
            phase_history: vec![Phase::Validation],
            nodes: NodeSlots::new(NodeId::ALL),
            errors: Vec::new(),
            retrieved_context: BTreeMap::new(),
            framework_context: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to the next phase
    pub fn advance(&mut self, event: PhaseEvent) -> Result<Phase, WorkflowError> {
        let next = self.phase.on(event)?;
        info!("{}: {} -> {} ({:?})", self.ticker, self.phase, next, event);
        self.phase = next;
        self.phase_history.push(next);
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(next)
    }

    pub fn status(&self, node: NodeId) -> Option<NodeStatus> {
        self.nodes.status(&node)
    }

    pub fn dimension_output(&self, dimension: Dimension) -> Option<&DimensionOutput> {
        match self.nodes.result(&NodeId::from(dimension)) {
            Some(NodeResult::Dimension(output)) => Some(output),
            _ => None,
        }
    }

    /// Scores of the dimensions that completed, in dimension order
    pub fn scores(&self) -> Vec<ScoreRecord> {
        Dimension::ALL
            .into_iter()
            .filter_map(|d| self.dimension_output(d))
            .map(|output| output.payload.score)
            .collect()
    }

    /// Dimensions whose node ended in `status`
    pub fn dimensions_with(&self, status: NodeStatus) -> Vec<Dimension> {
        Dimension::ALL
            .into_iter()
            .filter(|d| self.status(NodeId::from(*d)) == Some(status))
            .collect()
    }

    pub fn recommendation(&self) -> Option<&Recommendation> {
        match self.nodes.result(&NodeId::Compilation) {
            Some(NodeResult::Compiled { recommendation, .. }) => recommendation.as_ref(),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.phase == Phase::Failed
    }

    /// First fatal error, if the run was aborted
    pub fn fatal_error(&self) -> Option<&ErrorEntry> {
        self.errors.iter().find(|e| e.severity == Severity::Fatal)
    }
}
