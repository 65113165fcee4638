//! Optional embedding capability

use crate::Result;
use async_trait::async_trait;

/// Turns text into a dense vector
///
/// This capability is optional. When no engine is configured, retrieval
/// falls back to keyword overlap.
#[async_trait]
pub trait EmbeddingEngine: Send + Sync {
    /// Embed a single piece of text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
