//! Reference knowledge used to enrich analysis prompts

pub mod retriever;
pub mod store;

pub use retriever::{
    ContextRetriever, KeywordStrategy, Retrieval, RetrievalStrategy, ScoredEntry,
    SimilarityStrategy, StrategyKind, dimension_query, framework_query,
};
pub use store::{KnowledgeCategory, KnowledgeEntry, KnowledgeStore};
