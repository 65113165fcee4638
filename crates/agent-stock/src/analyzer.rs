//! Entry points for ticker analysis
//!
//! [`TickerAnalyzer`] owns the collaborators, the cache and the knowledge
//! store, probes optional capabilities once at build time, and exposes
//! [`run_analysis`](TickerAnalyzer::run_analysis) and
//! [`get_status`](TickerAnalyzer::get_status).

use crate::agents::{DimensionAnalyzer, default_analyzers};
use crate::cache::{AnalysisType, CacheManager};
use crate::config::AnalyzerConfig;
use crate::engine::{
    RunRequest, WorkflowEngine, WorkflowGraph, WorkflowRun, WorkflowState, with_timeout,
    workflow_graph,
};
use crate::error::{Result, StockError};
use crate::knowledge::{ContextRetriever, KnowledgeCategory, KnowledgeEntry, KnowledgeStore, StrategyKind};
use agent_core::{
    CollaboratorError, EmbeddingEngine, FinancialDataProvider, ReasoningProvider, SentimentProvider,
};
use agent_workflow::{CancellationSignal, ExecutionMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Optional capabilities detected when the analyzer was built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// An embedding engine answered the probe; retrieval uses similarity search
    pub embedding: bool,
    /// Dimension nodes run on a bounded worker pool
    pub orchestration: bool,
}

/// Per-call options
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Name of the reasoning provider; the default provider when unset or unknown
    pub reasoner: Option<String>,
    pub recommend: bool,
    /// Overrides the configured retrieval flag
    pub use_retrieval: Option<bool>,
    pub force_refresh: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            reasoner: None,
            recommend: true,
            use_retrieval: None,
            force_refresh: false,
        }
    }
}

impl AnalysisOptions {
    pub fn with_reasoner(mut self, name: impl Into<String>) -> Self {
        self.reasoner = Some(name.into());
        self
    }

    pub fn recommend(mut self, recommend: bool) -> Self {
        self.recommend = recommend;
        self
    }

    pub fn use_retrieval(mut self, enabled: bool) -> Self {
        self.use_retrieval = Some(enabled);
        self
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}

/// Ticker analysis facade
pub struct TickerAnalyzer {
    config: AnalyzerConfig,
    engine: WorkflowEngine,
    retriever: Arc<ContextRetriever>,
    reasoners: HashMap<String, Arc<dyn ReasoningProvider>>,
    default_name: String,
    default_reasoner: Arc<dyn ReasoningProvider>,
    capabilities: Capabilities,
}

impl TickerAnalyzer {
    pub fn builder() -> TickerAnalyzerBuilder {
        TickerAnalyzerBuilder::default()
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Strategy serving knowledge retrieval
    pub fn retrieval_strategy(&self) -> StrategyKind {
        self.retriever.strategy()
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.engine.mode()
    }

    pub fn cache(&self) -> &CacheManager {
        self.engine.cache()
    }

    /// Node graph and phase transition table
    pub fn workflow_graph(&self) -> WorkflowGraph {
        workflow_graph()
    }

    /// Run the workflow to a terminal phase, whatever the outcome
    pub async fn run(
        &self,
        ticker: &str,
        options: AnalysisOptions,
        signal: &CancellationSignal,
    ) -> WorkflowRun {
        let request = RunRequest {
            ticker: ticker.to_string(),
            reasoner: self.select_reasoner(options.reasoner.as_deref()),
            recommend: options.recommend,
            use_retrieval: options.use_retrieval.unwrap_or(self.config.use_retrieval),
            force_refresh: options.force_refresh,
        };
        self.engine.run(request, signal).await
    }

    /// Analyze `ticker`
    ///
    /// A run that fails validation is returned as [`StockError::Validation`];
    /// dimension failures are not errors and show up in the state's error log.
    pub async fn run_analysis(&self, ticker: &str, options: AnalysisOptions) -> Result<WorkflowRun> {
        let run = self.run(ticker, options, &CancellationSignal::never()).await;

        if let Some(fatal) = run.state.fatal_error() {
            return Err(StockError::Validation {
                ticker: run.state.ticker.clone(),
                reason: fatal.message.clone(),
            });
        }
        Ok(run)
    }

    /// Last cached terminal state for `ticker`, fresh or not
    pub async fn get_status(&self, ticker: &str) -> Result<Option<WorkflowState>> {
        let ticker = ticker.trim().to_uppercase();
        match self
            .cache()
            .get_allow_stale(&ticker, AnalysisType::Workflow)
            .await
        {
            Some(entry) => Ok(Some(serde_json::from_value(entry.payload)?)),
            None => Ok(None),
        }
    }

    /// Add an entry to the knowledge store
    pub async fn ingest_knowledge(
        &self,
        category: KnowledgeCategory,
        text: impl Into<String>,
    ) -> KnowledgeEntry {
        self.retriever.ingest(category, text).await
    }

    /// Write the knowledge store to `path`
    pub async fn save_knowledge(&self, path: impl AsRef<Path>) -> Result<()> {
        self.retriever.snapshot().await.save(path.as_ref()).await
    }

    fn select_reasoner(&self, name: Option<&str>) -> Arc<dyn ReasoningProvider> {
        if let Some(name) = name {
            if let Some(provider) = self.reasoners.get(name) {
                return Arc::clone(provider);
            }
            debug!(
                "{}",
                CollaboratorError::CapabilityUnavailable(format!(
                    "reasoning provider {name:?}, using {:?}",
                    self.default_name
                ))
            );
        }
        Arc::clone(&self.default_reasoner)
    }
}

/// Builder for [`TickerAnalyzer`]
#[derive(Default)]
pub struct TickerAnalyzerBuilder {
    config: Option<AnalyzerConfig>,
    financial: Option<Arc<dyn FinancialDataProvider>>,
    sentiment: Option<Arc<dyn SentimentProvider>>,
    reasoners: Vec<(String, Arc<dyn ReasoningProvider>)>,
    embedding: Option<Arc<dyn EmbeddingEngine>>,
    knowledge: Option<KnowledgeStore>,
    analyzers: Vec<Arc<dyn DimensionAnalyzer>>,
}

impl TickerAnalyzerBuilder {
    pub fn config(mut self, config: AnalyzerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn financial_data(mut self, provider: Arc<dyn FinancialDataProvider>) -> Self {
        self.financial = Some(provider);
        self
    }

    pub fn sentiment(mut self, provider: Arc<dyn SentimentProvider>) -> Self {
        self.sentiment = Some(provider);
        self
    }

    /// Register a named reasoning provider; the first one becomes the default
    pub fn reasoner(mut self, name: impl Into<String>, provider: Arc<dyn ReasoningProvider>) -> Self {
        self.reasoners.push((name.into(), provider));
        self
    }

    pub fn embedding_engine(mut self, engine: Arc<dyn EmbeddingEngine>) -> Self {
        self.embedding = Some(engine);
        self
    }

    /// Start from this store instead of the default seed
    pub fn knowledge(mut self, store: KnowledgeStore) -> Self {
        self.knowledge = Some(store);
        self
    }

    /// Replace the standard adapter for the analyzer's dimension
    pub fn analyzer(mut self, analyzer: Arc<dyn DimensionAnalyzer>) -> Self {
        self.analyzers.push(analyzer);
        self
    }

    pub async fn build(self) -> Result<TickerAnalyzer> {
        let config = match self.config {
            Some(config) => config,
            None => AnalyzerConfig::from_env()?,
        };
        config.validate()?;

        let financial = self
            .financial
            .ok_or_else(|| StockError::Config("a financial data provider is required".into()))?;
        let sentiment = self
            .sentiment
            .ok_or_else(|| StockError::Config("a sentiment provider is required".into()))?;
        let (default_name, default_reasoner) = self
            .reasoners
            .first()
            .cloned()
            .ok_or_else(|| StockError::Config("at least one reasoning provider is required".into()))?;

        let embedding = probe_embedding(self.embedding, config.node_timeout).await;
        let mode = config.execution_mode();
        let capabilities = Capabilities {
            embedding: embedding.is_some(),
            orchestration: mode.is_concurrent(),
        };
        info!(
            "Capabilities: embedding={}, orchestration={} ({:?})",
            capabilities.embedding, capabilities.orchestration, mode
        );

        let mut cache = CacheManager::new(config.freshness_window);
        if let Some(dir) = &config.cache_dir {
            cache = cache.with_root(dir);
            match cache.load_dir().await {
                Ok(restored) => debug!("Restored {} cache entries from {}", restored, dir.display()),
                Err(e) => warn!("Could not read cache directory {}: {}", dir.display(), e),
            }
        }

        let store = self.knowledge.unwrap_or_else(KnowledgeStore::with_defaults);
        let retriever =
            Arc::new(ContextRetriever::new(store, embedding).with_timeout(config.node_timeout));

        let mut analyzers = default_analyzers(sentiment);
        analyzers.extend(self.analyzers);

        let engine = WorkflowEngine::new(
            config.clone(),
            cache,
            Arc::clone(&retriever),
            financial,
            analyzers,
            mode,
        )?;

        Ok(TickerAnalyzer {
            config,
            engine,
            retriever,
            reasoners: self.reasoners.into_iter().collect(),
            default_name,
            default_reasoner,
            capabilities,
        })
    }
}

/// Keep the embedding engine only if it answers a probe request
async fn probe_embedding(
    engine: Option<Arc<dyn EmbeddingEngine>>,
    timeout: Duration,
) -> Option<Arc<dyn EmbeddingEngine>> {
    let Some(engine) = engine else {
        debug!("{}", CollaboratorError::CapabilityUnavailable("embedding engine".into()));
        return None;
    };

    match with_timeout(timeout, engine.embed("capability probe")).await {
        Ok(vector) if !vector.is_empty() => Some(engine),
        Ok(_) => {
            debug!("Embedding engine returned an empty vector, disabling similarity retrieval");
            None
        }
        Err(e) => {
            debug!("Embedding engine failed its probe ({}), disabling similarity retrieval", e);
            None
        }
    }
}
