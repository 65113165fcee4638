//! End-to-end runs of the analysis workflow against in-memory collaborators

use agent_core::{
    CollaboratorError, DocumentSource, EmbeddingEngine, FinancialDataProvider, FinancialFacts,
    FinancialPeriod, PromptContext, Reasoning, ReasoningProvider, Result as CollaboratorResult,
    SentimentDocument, SentimentProvider,
};
use agent_stock::engine::{DimensionPayload, ErrorKind, NodeId, Origin};
use agent_stock::{
    AnalysisOptions, AnalysisType, AnalyzerConfig, CacheEntry, Dimension, Phase, ScoreRecord,
    StockError, StrategyKind, TickerAnalyzer, Tier,
};
use agent_workflow::{NodeStatus, cancellation};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use mockall::mock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct StaticFinancials;

#[async_trait]
impl FinancialDataProvider for StaticFinancials {
    async fn fetch(&self, ticker: &str) -> CollaboratorResult<FinancialFacts> {
        Ok(FinancialFacts {
            company_name: Some("Acme Corp".into()),
            sector: Some("Technology".into()),
            industry: Some("Software".into()),
            ceo_name: Some("Jane Doe".into()),
            business_summary: Some("Industrial software".into()),
            return_on_equity: Some(0.2),
            periods: vec![
                FinancialPeriod {
                    label: "2024".into(),
                    revenue: Some(500.0),
                    research_and_development: Some(90.0),
                    gross_profit: Some(300.0),
                    operating_income: Some(120.0),
                    net_income: Some(80.0),
                },
                FinancialPeriod {
                    label: "2023".into(),
                    revenue: Some(400.0),
                    research_and_development: Some(60.0),
                    gross_profit: Some(230.0),
                    operating_income: Some(90.0),
                    net_income: Some(55.0),
                },
            ],
            ..FinancialFacts::new(ticker)
        })
    }
}

struct StaticSentiment;

#[async_trait]
impl SentimentProvider for StaticSentiment {
    async fn fetch(&self, _ticker: &str) -> CollaboratorResult<Vec<SentimentDocument>> {
        Ok(vec![
            SentimentDocument::scored(DocumentSource::News, "Acme beats estimates", 0.4),
            SentimentDocument::scored(DocumentSource::Social, "", 0.2),
        ])
    }
}

/// Scores each dimension from a table, failing the dimensions listed in `failing`
#[derive(Clone)]
struct ScriptedReasoner {
    scores: HashMap<&'static str, f64>,
    failing: HashMap<&'static str, CollaboratorError>,
    calls: Arc<Mutex<Vec<PromptContext>>>,
}

impl ScriptedReasoner {
    /// Scores 8, 7, 6, 9, 5 in dimension order
    fn scenario_a() -> Self {
        Self {
            scores: HashMap::from([
                ("cash_flow", 8.0),
                ("profit", 7.0),
                ("leadership", 6.0),
                ("technology", 9.0),
                ("sentiment", 5.0),
            ]),
            failing: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing(mut self, dimension: &'static str, error: CollaboratorError) -> Self {
        self.failing.insert(dimension, error);
        self
    }

    async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedReasoner {
    async fn generate(&self, _prompt: &str, context: &PromptContext) -> CollaboratorResult<Reasoning> {
        self.calls.lock().await.push(context.clone());
        let dimension = context.dimension().unwrap_or_default();

        if let Some(error) = self.failing.get(dimension) {
            return Err(error.clone());
        }
        let score = self.scores.get(dimension).copied().unwrap_or(5.0);
        Ok(Reasoning::new(format!("{dimension} reviewed"), score))
    }
}

mock! {
    pub Reasoner {}

    #[async_trait]
    impl ReasoningProvider for Reasoner {
        async fn generate(&self, prompt: &str, context: &PromptContext) -> CollaboratorResult<Reasoning>;
    }
}

fn config() -> AnalyzerConfig {
    AnalyzerConfig::builder()
        .max_retries(2)
        .retry_backoff_base(Duration::from_millis(1))
        .max_backoff(Duration::from_millis(5))
        .build()
        .unwrap()
}

async fn analyzer_with(config: AnalyzerConfig, reasoner: Arc<dyn ReasoningProvider>) -> TickerAnalyzer {
    TickerAnalyzer::builder()
        .config(config)
        .financial_data(Arc::new(StaticFinancials))
        .sentiment(Arc::new(StaticSentiment))
        .reasoner("scripted", reasoner)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_all_dimensions_scored_gives_buy() {
    let analyzer = analyzer_with(config(), Arc::new(ScriptedReasoner::scenario_a())).await;

    let run = analyzer
        .run_analysis("ACME", AnalysisOptions::default())
        .await
        .unwrap();

    assert_eq!(run.state.phase, Phase::Done);
    assert_eq!(run.state.dimensions_with(NodeStatus::Done), Dimension::ALL.to_vec());

    let rec = run.recommendation.unwrap();
    assert_eq!(rec.weighted_score(), 7.15);
    assert_eq!(rec.tier(), Tier::Buy);
    assert_eq!(rec.confidence_label, "Medium-High");
    assert!(rec.completeness.is_complete());
    assert!(rec.opportunity_factors.contains(&"High innovation capacity".to_string()));
}

#[tokio::test]
async fn test_missing_technology_renormalizes() {
    let reasoner = ScriptedReasoner::scenario_a().failing(
        "technology",
        CollaboratorError::DataUnavailable("no patent filings".into()),
    );
    let analyzer = analyzer_with(config(), Arc::new(reasoner)).await;

    let run = analyzer
        .run_analysis("ACME", AnalysisOptions::default())
        .await
        .unwrap();

    assert_eq!(run.state.phase, Phase::Done);
    assert_eq!(run.state.status(NodeId::Technology), Some(NodeStatus::Failed));
    assert!(run.state.errors.iter().any(|e| e.node == NodeId::Technology
        && e.kind == ErrorKind::DataUnavailable));

    let rec = run.recommendation.unwrap();
    assert_eq!(rec.weighted_score(), 6.6875);
    assert_eq!(rec.tier(), Tier::Buy);
    assert_eq!(rec.completeness.failed, vec![Dimension::Technology]);
    assert_eq!(rec.scores.len(), 4);
}

#[tokio::test]
async fn test_bad_ticker_fails_without_side_effects() {
    let reasoner = ScriptedReasoner::scenario_a();
    let analyzer = analyzer_with(config(), Arc::new(reasoner.clone())).await;

    let result = analyzer
        .run_analysis("BADTICKER", AnalysisOptions::default())
        .await;
    assert!(matches!(result, Err(StockError::Validation { .. })));

    let run = analyzer
        .run(
            "BADTICKER",
            AnalysisOptions::default(),
            &agent_workflow::CancellationSignal::never(),
        )
        .await;
    assert_eq!(run.state.phase, Phase::Failed);
    assert!(run.recommendation.is_none());
    assert!(run.state.nodes.all_terminal());
    for node in NodeId::DIMENSIONS {
        assert_eq!(run.state.status(node), Some(NodeStatus::Skipped));
    }

    assert!(analyzer.cache().is_empty().await);
    assert_eq!(reasoner.call_count().await, 0);
    assert!(analyzer.get_status("BADTICKER").await.unwrap().is_none());
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let mut mock = MockReasoner::new();
    mock.expect_generate()
        .times(5)
        .returning(|_, _| Ok(Reasoning::new("consistent", 7.0)));
    let analyzer = analyzer_with(config(), Arc::new(mock)).await;

    let first = analyzer
        .run_analysis("ACME", AnalysisOptions::default())
        .await
        .unwrap();
    let second = analyzer
        .run_analysis("ACME", AnalysisOptions::default())
        .await
        .unwrap();

    for dimension in Dimension::ALL {
        let before = first.state.dimension_output(dimension).unwrap();
        let after = second.state.dimension_output(dimension).unwrap();
        assert_eq!(before.origin, Origin::Computed);
        assert_eq!(after.origin, Origin::FreshCache);
        assert_eq!(before.payload, after.payload);
    }
    assert_eq!(
        first.recommendation.unwrap().weighted_score(),
        second.recommendation.unwrap().weighted_score()
    );
}

#[tokio::test]
async fn test_force_refresh_recomputes() {
    let reasoner = ScriptedReasoner::scenario_a();
    let analyzer = analyzer_with(config(), Arc::new(reasoner.clone())).await;

    analyzer.run_analysis("ACME", AnalysisOptions::default()).await.unwrap();
    let run = analyzer
        .run_analysis("ACME", AnalysisOptions::default().force_refresh(true))
        .await
        .unwrap();

    assert_eq!(reasoner.call_count().await, 10);
    assert_eq!(
        run.state.dimension_output(Dimension::Profit).unwrap().origin,
        Origin::Computed
    );
}

#[tokio::test]
async fn test_stale_entry_backs_a_failed_dimension() {
    let reasoner = ScriptedReasoner::scenario_a().failing(
        "profit",
        CollaboratorError::RateLimited("429 Too Many Requests".into()),
    );
    let analyzer = analyzer_with(config(), Arc::new(reasoner.clone())).await;

    let old = Utc::now() - TimeDelta::days(20);
    let payload = DimensionPayload {
        score: ScoreRecord::new(Dimension::Profit, 7.0, 0.9),
        narrative: "profit reviewed last month".into(),
        metrics: serde_json::json!({}),
        computed_at: old,
    };
    analyzer
        .cache()
        .put_entry(
            CacheEntry::new("ACME", AnalysisType::Profit, serde_json::to_value(&payload).unwrap())
                .at(old),
        )
        .await
        .unwrap();

    let run = analyzer
        .run_analysis("ACME", AnalysisOptions::default())
        .await
        .unwrap();

    let profit = run.state.dimension_output(Dimension::Profit).unwrap();
    assert_eq!(profit.origin, Origin::StaleCache);
    assert_eq!(profit.payload.narrative, "profit reviewed last month");

    let profit_calls = reasoner
        .calls
        .lock()
        .await
        .iter()
        .filter(|c| c.dimension() == Some("profit"))
        .count();
    assert_eq!(profit_calls, 3);

    let rec = run.recommendation.unwrap();
    assert_eq!(rec.weighted_score(), 7.15);
    assert_eq!(rec.completeness.stale, vec![Dimension::Profit]);
}

#[tokio::test]
async fn test_sequential_and_concurrent_runs_agree() {
    let failing = || {
        ScriptedReasoner::scenario_a().failing(
            "leadership",
            CollaboratorError::DataUnavailable("no executive data".into()),
        )
    };

    let sequential = analyzer_with(
        AnalyzerConfig { max_concurrency: 1, ..config() },
        Arc::new(failing()),
    )
    .await;
    let concurrent = analyzer_with(
        AnalyzerConfig { max_concurrency: 5, ..config() },
        Arc::new(failing()),
    )
    .await;
    assert!(!sequential.capabilities().orchestration);
    assert!(concurrent.capabilities().orchestration);

    let a = sequential
        .run_analysis("ACME", AnalysisOptions::default())
        .await
        .unwrap();
    let b = concurrent
        .run_analysis("ACME", AnalysisOptions::default())
        .await
        .unwrap();

    assert_eq!(a.state.phase_history, b.state.phase_history);
    assert_eq!(a.state.errors, b.state.errors);
    for dimension in Dimension::ALL {
        assert_eq!(
            a.state.retrieved_context.get(&dimension).map(|r| r.snippets()),
            b.state.retrieved_context.get(&dimension).map(|r| r.snippets())
        );
    }
    for node in NodeId::ALL {
        assert_eq!(a.state.status(node), b.state.status(node));
    }
    for dimension in Dimension::ALL {
        let left = a.state.dimension_output(dimension).map(|o| (&o.payload.score, &o.payload.narrative));
        let right = b.state.dimension_output(dimension).map(|o| (&o.payload.score, &o.payload.narrative));
        assert_eq!(left, right);
    }
    assert_eq!(a.recommendation, b.recommendation);
}

#[tokio::test]
async fn test_cancellation_stops_pending_nodes() {
    struct CancelOnFirstCall {
        handle: agent_workflow::CancelHandle,
    }

    #[async_trait]
    impl ReasoningProvider for CancelOnFirstCall {
        async fn generate(&self, _p: &str, _c: &PromptContext) -> CollaboratorResult<Reasoning> {
            self.handle.cancel();
            std::future::pending().await
        }
    }

    let (handle, signal) = cancellation();
    let analyzer = analyzer_with(
        AnalyzerConfig { max_concurrency: 1, ..config() },
        Arc::new(CancelOnFirstCall { handle }),
    )
    .await;

    let run = analyzer.run("ACME", AnalysisOptions::default(), &signal).await;

    assert_eq!(run.state.phase, Phase::Cancelled);
    assert_eq!(run.state.status(NodeId::CashFlow), Some(NodeStatus::Failed));
    for node in [NodeId::Profit, NodeId::Leadership, NodeId::Technology, NodeId::Sentiment, NodeId::Compilation] {
        assert_eq!(run.state.status(node), Some(NodeStatus::Skipped));
    }
    assert!(run.state.errors.iter().any(|e| e.kind == ErrorKind::Cancelled));
    assert!(run.recommendation.is_none());
    assert!(analyzer.get_status("ACME").await.unwrap().is_none());
}

#[tokio::test]
async fn test_exhausted_retries_surface_as_data_unavailable() {
    let reasoner = ScriptedReasoner::scenario_a().failing(
        "sentiment",
        CollaboratorError::Timeout(Duration::from_secs(30)),
    );
    let analyzer = analyzer_with(config(), Arc::new(reasoner)).await;

    let run = analyzer
        .run_analysis("ACME", AnalysisOptions::default())
        .await
        .unwrap();

    let sentiment_errors: Vec<_> = run
        .state
        .errors
        .iter()
        .filter(|e| e.node == NodeId::Sentiment)
        .collect();
    let attempts: Vec<_> = sentiment_errors.iter().filter_map(|e| e.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert_eq!(sentiment_errors.last().unwrap().kind, ErrorKind::DataUnavailable);
    assert_eq!(run.state.status(NodeId::Sentiment), Some(NodeStatus::Failed));
    assert!(run.recommendation.is_some());
}

#[tokio::test]
async fn test_retrieval_falls_back_to_keywords() {
    /// Answers the startup probe, then fails every call
    struct FlakyEmbedding {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl EmbeddingEngine for FlakyEmbedding {
        async fn embed(&self, _text: &str) -> CollaboratorResult<Vec<f32>> {
            let mut calls = self.calls.lock().await;
            *calls += 1;
            if *calls == 1 {
                Ok(vec![1.0, 0.0, 0.0])
            } else {
                Err(CollaboratorError::TransientIo("embedding service down".into()))
            }
        }
    }

    let analyzer = TickerAnalyzer::builder()
        .config(config())
        .financial_data(Arc::new(StaticFinancials))
        .sentiment(Arc::new(StaticSentiment))
        .reasoner("scripted", Arc::new(ScriptedReasoner::scenario_a()))
        .embedding_engine(Arc::new(FlakyEmbedding { calls: Mutex::new(0) }))
        .build()
        .await
        .unwrap();

    assert!(analyzer.capabilities().embedding);
    assert_eq!(analyzer.retrieval_strategy(), StrategyKind::Similarity);

    let run = analyzer
        .run_analysis("ACME", AnalysisOptions::default())
        .await
        .unwrap();

    assert_eq!(run.state.phase, Phase::Done);
    assert_eq!(run.state.retrieved_context.len(), 5);
    assert!(run
        .state
        .retrieved_context
        .values()
        .all(|r| r.strategy == StrategyKind::Keyword));
}

/// Answers the startup check, then never responds again
struct StallingEmbedding {
    calls: Mutex<u32>,
}

#[async_trait]
impl EmbeddingEngine for StallingEmbedding {
    async fn embed(&self, _text: &str) -> CollaboratorResult<Vec<f32>> {
        let first = {
            let mut calls = self.calls.lock().await;
            *calls += 1;
            *calls == 1
        };
        if first {
            return Ok(vec![0.0, 1.0, 0.0]);
        }
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_embedding_engine_does_not_stall_the_run() {
    let analyzer = TickerAnalyzer::builder()
        .config(AnalyzerConfig {
            node_timeout: Duration::from_secs(1),
            ..config()
        })
        .financial_data(Arc::new(StaticFinancials))
        .sentiment(Arc::new(StaticSentiment))
        .reasoner("scripted", Arc::new(ScriptedReasoner::scenario_a()))
        .embedding_engine(Arc::new(StallingEmbedding { calls: Mutex::new(0) }))
        .build()
        .await
        .unwrap();
    assert_eq!(analyzer.retrieval_strategy(), StrategyKind::Similarity);

    let finished = tokio::time::timeout(
        Duration::from_secs(3600),
        analyzer.run_analysis("ACME", AnalysisOptions::default()),
    )
    .await;
    let run = tokio_test::assert_ok!(tokio_test::assert_ok!(finished));

    assert_eq!(run.state.phase, Phase::Done);
    assert!(run
        .state
        .retrieved_context
        .values()
        .all(|r| r.strategy == StrategyKind::Keyword));
    assert_eq!(
        run.state.framework_context.map(|r| r.strategy),
        Some(StrategyKind::Keyword)
    );
    assert_eq!(run.recommendation.unwrap().weighted_score(), 7.15);
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_embedding_engine_fails_the_probe() {
    struct Silent;

    #[async_trait]
    impl EmbeddingEngine for Silent {
        async fn embed(&self, _text: &str) -> CollaboratorResult<Vec<f32>> {
            std::future::pending().await
        }
    }

    let analyzer = TickerAnalyzer::builder()
        .config(AnalyzerConfig {
            node_timeout: Duration::from_secs(1),
            ..config()
        })
        .financial_data(Arc::new(StaticFinancials))
        .sentiment(Arc::new(StaticSentiment))
        .reasoner("scripted", Arc::new(ScriptedReasoner::scenario_a()))
        .embedding_engine(Arc::new(Silent))
        .build()
        .await
        .unwrap();

    assert!(!analyzer.capabilities().embedding);
    assert_eq!(analyzer.retrieval_strategy(), StrategyKind::Keyword);
}

#[tokio::test]
async fn test_without_embedding_engine_uses_keywords() {
    let reasoner = ScriptedReasoner::scenario_a();
    let analyzer = analyzer_with(config(), Arc::new(reasoner.clone())).await;

    assert!(!analyzer.capabilities().embedding);
    assert_eq!(analyzer.retrieval_strategy(), StrategyKind::Keyword);

    analyzer
        .run_analysis("ACME", AnalysisOptions::default().use_retrieval(false))
        .await
        .unwrap();

    let calls = reasoner.calls.lock().await;
    assert_eq!(calls.len(), 5);
    assert!(calls.iter().all(|c| c.snippets().is_empty()));
}

#[tokio::test]
async fn test_reasoner_selection() {
    let primary = ScriptedReasoner::scenario_a();
    let secondary = ScriptedReasoner::scenario_a();

    let analyzer = TickerAnalyzer::builder()
        .config(config())
        .financial_data(Arc::new(StaticFinancials))
        .sentiment(Arc::new(StaticSentiment))
        .reasoner("primary", Arc::new(primary.clone()))
        .reasoner("secondary", Arc::new(secondary.clone()))
        .build()
        .await
        .unwrap();

    analyzer
        .run_analysis("ACME", AnalysisOptions::default().with_reasoner("secondary"))
        .await
        .unwrap();
    assert_eq!(secondary.call_count().await, 5);
    assert_eq!(primary.call_count().await, 0);

    analyzer
        .run_analysis(
            "BETA",
            AnalysisOptions::default().with_reasoner("missing"),
        )
        .await
        .unwrap();
    assert_eq!(primary.call_count().await, 5);
}

#[tokio::test]
async fn test_status_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = AnalyzerConfig {
        cache_dir: Some(dir.path().to_path_buf()),
        ..config()
    };

    let first = analyzer_with(config.clone(), Arc::new(ScriptedReasoner::scenario_a())).await;
    let run = first
        .run_analysis("acme", AnalysisOptions::default())
        .await
        .unwrap();

    let status = first.get_status("ACME").await.unwrap().unwrap();
    assert_eq!(status.run_id, run.state.run_id);

    let restarted = analyzer_with(config, Arc::new(ScriptedReasoner::scenario_a())).await;
    let restored = restarted.get_status("acme").await.unwrap().unwrap();
    assert_eq!(restored.run_id, run.state.run_id);
    assert_eq!(restored.phase, Phase::Done);
    assert_eq!(
        restored.recommendation().map(|r| r.tier()),
        Some(Tier::Buy)
    );
}

#[tokio::test]
async fn test_missing_reasoner_is_a_config_error() {
    let result = TickerAnalyzer::builder()
        .config(config())
        .financial_data(Arc::new(StaticFinancials))
        .sentiment(Arc::new(StaticSentiment))
        .build()
        .await;

    assert!(matches!(result, Err(StockError::Config(_))));
}
