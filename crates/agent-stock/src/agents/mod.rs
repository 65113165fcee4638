//! Analysis node adapters, one per dimension
//!
//! An adapter turns structured facts into deterministic metrics
//! ([`Evidence`]) and supplies the prompt template the reasoning capability
//! is called with. Scoring and caching are handled by the workflow engine.

pub mod cash_flow;
pub mod leadership;
pub mod profit;
pub mod prompt;
pub mod sentiment;
pub mod technology;

pub use cash_flow::CashFlowAnalyzer;
pub use leadership::LeadershipAnalyzer;
pub use profit::ProfitAnalyzer;
pub use sentiment::SentimentAnalyzer;
pub use technology::TechnologyAnalyzer;

use crate::dimension::Dimension;
use agent_core::{CollaboratorError, FinancialFacts, SentimentProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Deterministic metrics gathered for one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub metrics: serde_json::Value,
    /// How complete the underlying data was, in [0, 1]
    pub confidence: f64,
}

impl Evidence {
    pub fn new(metrics: serde_json::Value, confidence: f64) -> Self {
        Self {
            metrics,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Adapter for one analysis dimension
#[async_trait]
pub trait DimensionAnalyzer: Send + Sync {
    fn dimension(&self) -> Dimension;

    /// MiniJinja template for the reasoning prompt
    ///
    /// Rendered with `ticker`, `company`, `metrics` and `snippets`.
    fn template(&self) -> &'static str;

    /// Compute metrics for the company
    ///
    /// Missing or malformed data is reported as
    /// [`CollaboratorError::DataUnavailable`]; collaborator timeouts and rate
    /// limits are passed through so the caller can retry.
    async fn collect(&self, facts: &FinancialFacts) -> Result<Evidence, CollaboratorError>;
}

/// The standard adapter for every dimension, in workflow order
pub fn default_analyzers(
    sentiment: Arc<dyn SentimentProvider>,
) -> Vec<Arc<dyn DimensionAnalyzer>> {
    vec![
        Arc::new(CashFlowAnalyzer),
        Arc::new(ProfitAnalyzer),
        Arc::new(LeadershipAnalyzer),
        Arc::new(TechnologyAnalyzer),
        Arc::new(SentimentAnalyzer::new(sentiment)),
    ]
}

/// Ratio as a percentage, when the denominator is usable
pub(crate) fn percent(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d.abs() > f64::EPSILON => Some(n / d * 100.0),
        _ => None,
    }
}
