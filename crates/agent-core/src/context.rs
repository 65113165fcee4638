//! Context handed to the reasoning capability
//!
//! `PromptContext` carries the retrieved knowledge snippets for a node plus a
//! small key-value store for run metadata (ticker, dimension, company).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known context keys
pub mod keys {
    /// Ticker symbol under analysis
    pub const TICKER: &str = "ticker";
    /// Analysis dimension (e.g. "cash_flow")
    pub const DIMENSION: &str = "dimension";
    /// Resolved company name
    pub const COMPANY: &str = "company";
    /// Retrieval strategy that produced the snippets
    pub const RETRIEVAL_STRATEGY: &str = "retrieval_strategy";
}

/// Context passed to a reasoning provider alongside the prompt
///
/// # Example
///
/// ```
/// use agent_core::PromptContext;
///
/// let ctx = PromptContext::new()
///     .with_ticker("AAPL")
///     .with_dimension("cash_flow")
///     .with_snippet("R&D above 15% of revenue signals innovation focus");
///
/// assert_eq!(ctx.ticker(), Some("AAPL"));
/// assert_eq!(ctx.snippets().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    /// Knowledge snippets, most relevant first
    snippets: Vec<String>,
    /// Key-value metadata
    data: HashMap<String, serde_json::Value>,
}

impl PromptContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    // =========== Builder Methods ===========

    /// Append a knowledge snippet
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippets.push(snippet.into());
        self
    }

    /// Append several knowledge snippets, keeping their order
    pub fn with_snippets<I, S>(mut self, snippets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.snippets.extend(snippets.into_iter().map(Into::into));
        self
    }

    /// Set the ticker
    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.insert(keys::TICKER, serde_json::json!(ticker.into()));
        self
    }

    /// Set the dimension
    pub fn with_dimension(mut self, dimension: impl Into<String>) -> Self {
        self.insert(keys::DIMENSION, serde_json::json!(dimension.into()));
        self
    }

    /// Set the company name
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.insert(keys::COMPANY, serde_json::json!(company.into()));
        self
    }

    // =========== Common Accessors ===========

    /// Knowledge snippets, most relevant first
    pub fn snippets(&self) -> &[String] {
        &self.snippets
    }

    /// Ticker under analysis
    pub fn ticker(&self) -> Option<&str> {
        self.get(keys::TICKER).and_then(|v| v.as_str())
    }

    /// Dimension under analysis
    pub fn dimension(&self) -> Option<&str> {
        self.get(keys::DIMENSION).and_then(|v| v.as_str())
    }

    /// Company name
    pub fn company(&self) -> Option<&str> {
        self.get(keys::COMPANY).and_then(|v| v.as_str())
    }

    // =========== Generic Key-Value Operations ===========

    /// Insert a metadata value
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Get a metadata value
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Whether the context carries no snippets and no metadata
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty() && self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let ctx = PromptContext::new()
            .with_ticker("MSFT")
            .with_dimension("technology")
            .with_company("Microsoft Corporation");

        assert_eq!(ctx.ticker(), Some("MSFT"));
        assert_eq!(ctx.dimension(), Some("technology"));
        assert_eq!(ctx.company(), Some("Microsoft Corporation"));
        assert!(ctx.snippets().is_empty());
    }

    #[test]
    fn test_snippets_keep_order() {
        let ctx = PromptContext::new()
            .with_snippet("first")
            .with_snippets(["second", "third"]);

        assert_eq!(ctx.snippets(), ["first", "second", "third"]);
    }

    #[test]
    fn test_generic_insert() {
        let mut ctx = PromptContext::new();
        assert!(ctx.is_empty());

        ctx.insert(keys::RETRIEVAL_STRATEGY, serde_json::json!("keyword"));
        assert_eq!(
            ctx.get(keys::RETRIEVAL_STRATEGY),
            Some(&serde_json::json!("keyword"))
        );
        assert!(!ctx.is_empty());
    }
}
