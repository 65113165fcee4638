//! Reasoning capability contract

use crate::{PromptContext, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Output of a reasoning call
///
/// `score` is expected on a 0-10 scale and `confidence` in [0, 1], but
/// providers are not trusted to respect either range; the engine clamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reasoning {
    /// Narrative analysis text
    pub narrative: String,
    /// Dimension score, nominally 0-10
    pub score: f64,
    /// Self-reported confidence, nominally 0-1
    pub confidence: f64,
}

impl Reasoning {
    /// Create a reasoning result with full confidence
    pub fn new(narrative: impl Into<String>, score: f64) -> Self {
        Self {
            narrative: narrative.into(),
            score,
            confidence: 1.0,
        }
    }

    /// Set the confidence
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Trait for reasoning backends (LLM providers or rule engines)
///
/// Implementations may fail with a transient error (timeout, rate limit) or
/// return low-confidence output. Callers never assume success.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Generate a narrative and score for `prompt`, grounded in `context`
    async fn generate(&self, prompt: &str, context: &PromptContext) -> Result<Reasoning>;
}
