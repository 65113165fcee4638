//! Collaborator contracts for ticker analysis
//!
//! The analysis engine never talks to an LLM, a market-data API or an
//! embedding model directly. It consumes them through the traits defined
//! here, so the engine can be exercised with fakes and wired to any backend.
//!
//! - [`ReasoningProvider`]: turns a prompt plus retrieved context into a narrative and score
//! - [`FinancialDataProvider`]: structured financial facts for a ticker
//! - [`SentimentProvider`]: raw news and social-media documents for a ticker
//! - [`EmbeddingEngine`]: optional text embedding capability

pub mod context;
pub mod data;
pub mod embedding;
pub mod error;
pub mod reasoning;

pub use context::PromptContext;
pub use data::{
    DocumentSource, FinancialDataProvider, FinancialFacts, FinancialPeriod, SentimentDocument,
    SentimentProvider,
};
pub use embedding::EmbeddingEngine;
pub use error::{CollaboratorError, Result};
pub use reasoning::{Reasoning, ReasoningProvider};
