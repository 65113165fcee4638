//! Ticker analysis workflow
//!
//! Analyzes a company ticker along five fixed dimensions (cash flow,
//! profitability, leadership, technology, sentiment) and produces a weighted
//! investment recommendation. It includes:
//!
//! - A knowledge store with similarity or keyword retrieval
//! - A freshness-bounded cache with stale fallback and optional persistence
//! - One adapter per dimension that computes metrics and prompts a reasoning provider
//! - A workflow engine with an explicit phase machine, retries, timeouts and cancellation
//! - Score aggregation with weight renormalization for missing dimensions
//!
//! External systems (LLMs, market data, embeddings) are reached through the
//! traits in `agent_core`.
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_stock::{AnalysisOptions, AnalyzerConfig, TickerAnalyzer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     agent_utils::init_tracing();
//!
//!     let analyzer = TickerAnalyzer::builder()
//!         .config(AnalyzerConfig::from_env()?)
//!         .financial_data(Arc::new(/* your provider */))
//!         .sentiment(Arc::new(/* your provider */))
//!         .reasoner("default", Arc::new(/* your provider */))
//!         .build()
//!         .await?;
//!
//!     let run = analyzer.run_analysis("AAPL", AnalysisOptions::default()).await?;
//!     if let Some(rec) = run.recommendation {
//!         println!("{} ({:.2}/10)", rec.tier(), rec.weighted_score());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod analyzer;
pub mod cache;
pub mod config;
pub mod dimension;
pub mod engine;
pub mod error;
pub mod knowledge;
pub mod scoring;

// Re-export main types for convenience
pub use analyzer::{AnalysisOptions, Capabilities, TickerAnalyzer, TickerAnalyzerBuilder};
pub use cache::{AnalysisType, CacheEntry, CacheManager};
pub use config::AnalyzerConfig;
pub use dimension::Dimension;
pub use engine::{Phase, WorkflowRun, WorkflowState};
pub use error::{Result, StockError};
pub use knowledge::{KnowledgeCategory, KnowledgeStore, StrategyKind};
pub use scoring::{Recommendation, ScoreRecord, Tier};
