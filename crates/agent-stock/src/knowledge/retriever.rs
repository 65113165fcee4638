//! Context retrieval over the knowledge store
//!
//! Two interchangeable [`RetrievalStrategy`] implementations rank entries
//! against a query: cosine similarity over embeddings, and keyword overlap.
//! The retriever picks one once, at construction, from whether an embedding
//! engine is available. A query never fails: if the similarity strategy
//! errors at query time the keyword strategy serves the request and the
//! result is tagged accordingly.

use super::store::{KnowledgeCategory, KnowledgeEntry, KnowledgeStore};
use crate::dimension::Dimension;
use agent_core::{CollaboratorError, EmbeddingEngine, FinancialFacts};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Which strategy served a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Similarity,
    Keyword,
}

/// Ranks knowledge entries against a query
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Relevance scores as `(index into entries, score)`
    ///
    /// Entries that are not relevant at all may be omitted.
    async fn rank(
        &self,
        query: &str,
        entries: &[KnowledgeEntry],
    ) -> Result<Vec<(usize, f64)>, CollaboratorError>;
}

/// Jaccard overlap of lowercase alphanumeric terms
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordStrategy;

impl KeywordStrategy {
    fn terms(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    /// Scores for entries sharing at least one term with the query
    pub fn score_all(&self, query: &str, entries: &[KnowledgeEntry]) -> Vec<(usize, f64)> {
        let query_terms = Self::terms(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                let doc_terms = Self::terms(&entry.text);
                let overlap = query_terms.intersection(&doc_terms).count();
                if overlap == 0 {
                    return None;
                }
                let union = query_terms.union(&doc_terms).count();
                Some((i, overlap as f64 / union as f64))
            })
            .collect()
    }
}

#[async_trait]
impl RetrievalStrategy for KeywordStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Keyword
    }

    async fn rank(
        &self,
        query: &str,
        entries: &[KnowledgeEntry],
    ) -> Result<Vec<(usize, f64)>, CollaboratorError> {
        Ok(self.score_all(query, entries))
    }
}

/// Cosine similarity over embeddings
///
/// Entries without a precomputed embedding are embedded on first use and
/// memoized by entry id.
pub struct SimilarityStrategy {
    engine: Arc<dyn EmbeddingEngine>,
    memo: Mutex<HashMap<u64, Vec<f32>>>,
}

impl SimilarityStrategy {
    pub fn new(engine: Arc<dyn EmbeddingEngine>) -> Self {
        Self {
            engine,
            memo: Mutex::new(HashMap::new()),
        }
    }

    async fn embedding_for(&self, entry: &KnowledgeEntry) -> Result<Vec<f32>, CollaboratorError> {
        if let Some(embedding) = &entry.embedding {
            return Ok(embedding.clone());
        }
        if let Some(embedding) = self.memo.lock().await.get(&entry.id) {
            return Ok(embedding.clone());
        }

        let embedding = self.engine.embed(&entry.text).await?;
        self.memo.lock().await.insert(entry.id, embedding.clone());
        Ok(embedding)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> Result<f64, CollaboratorError> {
    if a.len() != b.len() {
        return Err(CollaboratorError::DataUnavailable(format!(
            "embedding dimensions differ ({} vs {})",
            a.len(),
            b.len()
        )));
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm = |v: &[f32]| v.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let denom = norm(a) * norm(b);

    if denom <= f64::EPSILON {
        return Ok(0.0);
    }
    Ok(dot / denom)
}

#[async_trait]
impl RetrievalStrategy for SimilarityStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Similarity
    }

    async fn rank(
        &self,
        query: &str,
        entries: &[KnowledgeEntry],
    ) -> Result<Vec<(usize, f64)>, CollaboratorError> {
        let query_embedding = self.engine.embed(query).await?;

        let mut ranked = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let embedding = self.embedding_for(entry).await?;
            ranked.push((i, cosine(&query_embedding, &embedding)?));
        }
        Ok(ranked)
    }
}

/// A retrieved entry with its relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub entry: KnowledgeEntry,
    pub score: f64,
}

/// Result of a query, tagged with the strategy that served it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retrieval {
    pub strategy: StrategyKind,
    /// Most relevant first
    pub entries: Vec<ScoredEntry>,
}

impl Retrieval {
    pub fn snippets(&self) -> Vec<String> {
        self.entries.iter().map(|s| s.entry.text.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Retrieves the top-k knowledge entries for a query
pub struct ContextRetriever {
    store: Arc<RwLock<KnowledgeStore>>,
    strategy: Arc<dyn RetrievalStrategy>,
    fallback: KeywordStrategy,
    timeout: Duration,
}

/// Bound on a single ranking call before keyword overlap takes over
const DEFAULT_RANK_TIMEOUT: Duration = Duration::from_secs(60);

impl ContextRetriever {
    /// Pick the strategy from the availability of an embedding engine
    pub fn new(store: KnowledgeStore, embedding: Option<Arc<dyn EmbeddingEngine>>) -> Self {
        let strategy: Arc<dyn RetrievalStrategy> = match embedding {
            Some(engine) => Arc::new(SimilarityStrategy::new(engine)),
            None => {
                debug!("No embedding engine available, using keyword retrieval");
                Arc::new(KeywordStrategy)
            }
        };
        Self::with_strategy(store, strategy)
    }

    pub fn with_strategy(store: KnowledgeStore, strategy: Arc<dyn RetrievalStrategy>) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            strategy,
            fallback: KeywordStrategy,
            timeout: DEFAULT_RANK_TIMEOUT,
        }
    }

    /// Bound each ranking call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Strategy selected at construction
    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub async fn ingest(
        &self,
        category: KnowledgeCategory,
        text: impl Into<String>,
    ) -> KnowledgeEntry {
        self.store.write().await.ingest(category, text)
    }

    /// Copy of the current store contents
    pub async fn snapshot(&self) -> KnowledgeStore {
        self.store.read().await.clone()
    }

    /// Up to `k` entries, most relevant first
    ///
    /// Ties keep insertion order.
    pub async fn query(&self, text: &str, k: usize) -> Retrieval {
        let entries = self.store.read().await.entries().to_vec();

        let ranking = tokio::time::timeout(self.timeout, self.strategy.rank(text, &entries))
            .await
            .unwrap_or(Err(CollaboratorError::Timeout(self.timeout)));

        let (strategy, mut ranked) = match ranking {
            Ok(ranked) => (self.strategy.kind(), ranked),
            Err(e) => {
                debug!(
                    "{:?} retrieval unavailable ({}), falling back to keyword overlap",
                    self.strategy.kind(),
                    e
                );
                (StrategyKind::Keyword, self.fallback.score_all(text, &entries))
            }
        };

        ranked.retain(|(_, score)| score.is_finite());
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);

        Retrieval {
            strategy,
            entries: ranked
                .into_iter()
                .filter_map(|(i, score)| {
                    entries.get(i).map(|entry| ScoredEntry {
                        entry: entry.clone(),
                        score,
                    })
                })
                .collect(),
        }
    }
}

fn or_blank(value: Option<&str>) -> &str {
    value.unwrap_or_default()
}

/// Retrieval query for a dimension, parameterised by company facts
pub fn dimension_query(dimension: Dimension, facts: &FinancialFacts) -> String {
    let query = match dimension {
        Dimension::CashFlow => format!(
            "cash flow analysis revenue R&D spending {}",
            or_blank(facts.sector.as_deref())
        ),
        Dimension::Profit => format!(
            "profit margins profitability financial ratios {}",
            or_blank(facts.industry.as_deref())
        ),
        Dimension::Leadership => format!(
            "CEO leadership analysis executive assessment {}",
            or_blank(facts.ceo_name.as_deref())
        ),
        Dimension::Technology => format!(
            "technology analysis patents competitive advantage innovation {}",
            or_blank(facts.sector.as_deref())
        ),
        Dimension::Sentiment => format!(
            "sentiment analysis market perception social media news {}",
            facts.ticker
        ),
    };
    query.trim_end().to_string()
}

/// Retrieval query for the investment framework used at compilation
pub fn framework_query(facts: &FinancialFacts) -> String {
    format!(
        "investment recommendation framework analysis methodology {}",
        or_blank(facts.sector.as_deref())
    )
    .trim_end()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::Result as CollaboratorResult;

    /// Embeds text as keyword-presence counts over a tiny vocabulary
    struct VocabularyEmbedder;

    #[async_trait]
    impl EmbeddingEngine for VocabularyEmbedder {
        async fn embed(&self, text: &str) -> CollaboratorResult<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(["cash", "ceo", "patent"]
                .iter()
                .map(|w| lower.matches(w).count() as f32)
                .collect())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingEngine for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> CollaboratorResult<Vec<f32>> {
            Err(CollaboratorError::TransientIo("embedding service down".into()))
        }
    }

    /// Never answers
    struct HangingEmbedder;

    #[async_trait]
    impl EmbeddingEngine for HangingEmbedder {
        async fn embed(&self, _text: &str) -> CollaboratorResult<Vec<f32>> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_engine_times_out_to_keyword() {
        let retriever = ContextRetriever::new(
            KnowledgeStore::with_defaults(),
            Some(Arc::new(HangingEmbedder)),
        )
        .with_timeout(Duration::from_secs(1));

        let result = retriever.query("sentiment analysis news", 2).await;
        assert_eq!(result.strategy, StrategyKind::Keyword);
        assert_eq!(
            result.entries[0].entry.category,
            KnowledgeCategory::Sentiment
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_does_not_block_ingest() {
        let retriever = Arc::new(ContextRetriever::new(
            KnowledgeStore::with_defaults(),
            Some(Arc::new(HangingEmbedder)),
        ));

        let querying = tokio::spawn({
            let retriever = Arc::clone(&retriever);
            async move { retriever.query("cash flow", 1).await }
        });
        tokio::task::yield_now().await;

        let entry = tokio_test::assert_ok!(
            tokio::time::timeout(
                Duration::from_millis(10),
                retriever.ingest(KnowledgeCategory::Technology, "chip design"),
            )
            .await
        );
        assert_eq!(entry.text, "chip design");

        let result = querying.await.unwrap();
        assert_eq!(result.strategy, StrategyKind::Keyword);
        assert_eq!(retriever.snapshot().await.len(), 7);
    }

    #[tokio::test]
    async fn test_keyword_strategy_without_engine() {
        let retriever = ContextRetriever::new(KnowledgeStore::with_defaults(), None);
        assert_eq!(retriever.strategy(), StrategyKind::Keyword);

        let result = retriever
            .query("CEO leadership analysis executive assessment Tim Cook", 2)
            .await;

        assert_eq!(result.strategy, StrategyKind::Keyword);
        assert_eq!(result.entries.len(), 2);
        assert_eq!(
            result.entries[0].entry.category,
            KnowledgeCategory::Leadership
        );
        assert!(result.entries[0].score > result.entries[1].score);
    }

    #[tokio::test]
    async fn test_zero_overlap_entries_are_excluded() {
        let retriever = ContextRetriever::new(KnowledgeStore::with_defaults(), None);
        let result = retriever.query("zzz qqq", 5).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_similarity_strategy_with_engine() {
        let retriever = ContextRetriever::new(
            KnowledgeStore::with_defaults(),
            Some(Arc::new(VocabularyEmbedder)),
        );
        assert_eq!(retriever.strategy(), StrategyKind::Similarity);

        let result = retriever.query("patent moat", 1).await;
        assert_eq!(result.strategy, StrategyKind::Similarity);
        assert_eq!(
            result.entries[0].entry.category,
            KnowledgeCategory::Technology
        );
    }

    #[tokio::test]
    async fn test_failing_engine_falls_back_to_keyword() {
        let retriever = ContextRetriever::new(
            KnowledgeStore::with_defaults(),
            Some(Arc::new(BrokenEmbedder)),
        );

        let result = retriever.query("sentiment analysis news", 2).await;
        assert_eq!(result.strategy, StrategyKind::Keyword);
        assert_eq!(
            result.entries[0].entry.category,
            KnowledgeCategory::Sentiment
        );
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let mut store = KnowledgeStore::new();
        store.ingest(KnowledgeCategory::Technology, "chip design");
        store.ingest(KnowledgeCategory::Technology, "chip design");
        store.ingest(KnowledgeCategory::Technology, "chip design");
        let retriever = ContextRetriever::new(store, None);

        let result = retriever.query("chip design", 2).await;
        let ids: Vec<u64> = result.entries.iter().map(|s| s.entry.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_query_never_removes_entries() {
        let retriever = ContextRetriever::new(KnowledgeStore::with_defaults(), None);
        retriever.query("cash flow", 1).await;
        retriever.query("cash flow", 1).await;
        assert_eq!(retriever.snapshot().await.len(), 6);
    }

    #[tokio::test]
    async fn test_ingest_is_visible_to_queries() {
        let retriever = ContextRetriever::new(KnowledgeStore::new(), None);
        retriever
            .ingest(KnowledgeCategory::RdBenchmarks, "Biotech R&D often exceeds 20%")
            .await;

        let result = retriever.query("biotech", 3).await;
        assert_eq!(result.entries.len(), 1);
    }

    #[test]
    fn test_dimension_queries() {
        let facts = FinancialFacts {
            sector: Some("Technology".into()),
            ceo_name: Some("Jensen Huang".into()),
            ..FinancialFacts::new("NVDA")
        };

        assert_eq!(
            dimension_query(Dimension::Leadership, &facts),
            "CEO leadership analysis executive assessment Jensen Huang"
        );
        assert_eq!(
            dimension_query(Dimension::Sentiment, &facts),
            "sentiment analysis market perception social media news NVDA"
        );
        assert_eq!(
            dimension_query(Dimension::Profit, &facts),
            "profit margins profitability financial ratios"
        );
        assert_eq!(
            framework_query(&facts),
            "investment recommendation framework analysis methodology Technology"
        );
    }

    #[test]
    fn test_cosine() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
        assert!(cosine(&[1.0], &[1.0, 0.0]).is_err());
    }
}
