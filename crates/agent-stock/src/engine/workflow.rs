//! The analysis workflow
//!
//! Validation resolves the ticker, Preparation retrieves knowledge context
//! per dimension, Analysis runs the five dimension nodes through the
//! dispatcher, and Compilation aggregates whatever scores survived. All
//! writes to the [`WorkflowState`] happen on the task that drives the run;
//! nodes only hand their reports back through dispatcher events.

use super::graph::PhaseEvent;
use super::node::{NodeEnv, NodeReport, run_dimension, with_timeout};
use super::state::{
    DimensionOutput, ErrorEntry, ErrorKind, NodeId, NodeResult, Origin, Severity, WorkflowState,
};
use crate::agents::DimensionAnalyzer;
use crate::cache::{AnalysisType, CacheManager};
use crate::config::AnalyzerConfig;
use crate::dimension::Dimension;
use crate::error::{Result, StockError};
use crate::knowledge::{ContextRetriever, Retrieval, dimension_query, framework_query};
use crate::scoring::{Completeness, Recommendation, aggregate};
use agent_core::{CollaboratorError, FinancialDataProvider, FinancialFacts, ReasoningProvider};
use agent_workflow::{CancellationSignal, ExecutionMode, NodeEvent, NodeStatus, dispatch};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Accepted ticker syntax, after trimming and upper-casing
const TICKER_PATTERN: &str = r"^[A-Z0-9]{1,5}([.-][A-Z0-9]{1,4})?$";

/// Parameters of one run
#[derive(Clone)]
pub struct RunRequest {
    pub ticker: String,
    pub reasoner: Arc<dyn ReasoningProvider>,
    /// Produce a Recommendation at Compilation
    pub recommend: bool,
    pub use_retrieval: bool,
    /// Recompute even when a fresh cache entry exists
    pub force_refresh: bool,
}

impl RunRequest {
    pub fn new(ticker: impl Into<String>, reasoner: Arc<dyn ReasoningProvider>) -> Self {
        Self {
            ticker: ticker.into(),
            reasoner,
            recommend: true,
            use_retrieval: true,
            force_refresh: false,
        }
    }
}

/// Terminal state of a run and its recommendation, if one was produced
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub state: WorkflowState,
    pub recommendation: Option<Recommendation>,
}

impl WorkflowRun {
    fn from_state(state: WorkflowState) -> Self {
        let recommendation = state.recommendation().cloned();
        Self {
            state,
            recommendation,
        }
    }
}

/// Runs the analysis workflow for one ticker at a time
pub struct WorkflowEngine {
    config: AnalyzerConfig,
    cache: CacheManager,
    retriever: Arc<ContextRetriever>,
    financial: Arc<dyn FinancialDataProvider>,
    analyzers: BTreeMap<Dimension, Arc<dyn DimensionAnalyzer>>,
    mode: ExecutionMode,
    ticker_pattern: Regex,
}

impl WorkflowEngine {
    /// Assemble an engine; later analyzers replace earlier ones for the same dimension
    pub fn new(
        config: AnalyzerConfig,
        cache: CacheManager,
        retriever: Arc<ContextRetriever>,
        financial: Arc<dyn FinancialDataProvider>,
        analyzers: Vec<Arc<dyn DimensionAnalyzer>>,
        mode: ExecutionMode,
    ) -> Result<Self> {
        let ticker_pattern =
            Regex::new(TICKER_PATTERN).map_err(|e| StockError::Config(e.to_string()))?;

        Ok(Self {
            config,
            cache,
            retriever,
            financial,
            analyzers: analyzers
                .into_iter()
                .map(|analyzer| (analyzer.dimension(), analyzer))
                .collect(),
            mode,
            ticker_pattern,
        })
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Drive one run to a terminal phase
    pub async fn run(&self, request: RunRequest, signal: &CancellationSignal) -> WorkflowRun {
        let ticker = request.ticker.trim().to_uppercase();
        let mut state = WorkflowState::new(&ticker);
        info!("Starting analysis of {} (run {})", ticker, state.run_id);

        let Some(facts) = self.validate(&mut state, signal).await else {
            return WorkflowRun::from_state(state);
        };

        if signal.is_cancelled() {
            cancel(&mut state);
            return WorkflowRun::from_state(state);
        }
        self.prepare(&mut state, &facts, request.use_retrieval).await;

        if signal.is_cancelled() {
            cancel(&mut state);
            return WorkflowRun::from_state(state);
        }
        if self.analyze(&mut state, &facts, &request, signal).await {
            cancel(&mut state);
            return WorkflowRun::from_state(state);
        }

        if signal.is_cancelled() {
            cancel(&mut state);
            return WorkflowRun::from_state(state);
        }
        self.compile(&mut state, &facts, &request).await;
        self.persist(&mut state).await;

        WorkflowRun::from_state(state)
    }

    /// Check the ticker syntax and resolve it to company facts
    async fn validate(
        &self,
        state: &mut WorkflowState,
        signal: &CancellationSignal,
    ) -> Option<FinancialFacts> {
        let ticker = state.ticker.clone();
        mark(state, NodeId::Validation, NodeStatus::Running);

        if !self.ticker_pattern.is_match(&ticker) {
            abort(state, format!("malformed ticker {ticker:?}"));
            return None;
        }

        let retry = self.config.retry_policy();
        let timeout = self.config.node_timeout;
        let operation = format!("resolve {ticker}");
        let mut attempts = Vec::new();
        let resolve = retry.execute_observed(
            &operation,
            || with_timeout(timeout, self.financial.fetch(&ticker)),
            |attempt, e: &CollaboratorError| {
                if e.is_transient() {
                    attempts.push(
                        ErrorEntry::warning(NodeId::Validation, ErrorKind::TransientIo, e.to_string())
                            .with_attempt(attempt),
                    );
                }
            },
        );

        let resolved = tokio::select! {
            biased;
            () = signal.cancelled() => None,
            result = resolve => Some(result),
        };
        state.errors.append(&mut attempts);

        match resolved {
            None => {
                cancel(state);
                None
            }
            Some(Err(e)) => {
                let cause = StockError::from_collaborator(&ticker, e);
                abort(state, format!("ticker could not be resolved: {cause}"));
                None
            }
            Some(Ok(facts)) => {
                let company_name = facts.display_name().to_string();
                debug!("Resolved {} to {}", ticker, company_name);
                state.company_name = Some(company_name.clone());
                finish(
                    state,
                    NodeId::Validation,
                    NodeResult::Validated {
                        ticker: ticker.clone(),
                        company_name,
                    },
                );
                step(state, PhaseEvent::Validated);
                Some(facts)
            }
        }
    }

    /// Retrieve knowledge context for every dimension
    async fn prepare(&self, state: &mut WorkflowState, facts: &FinancialFacts, use_retrieval: bool) {
        mark(state, NodeId::Preparation, NodeStatus::Running);

        if use_retrieval {
            for dimension in self.analyzers.keys().copied() {
                let retrieval = self
                    .retriever
                    .query(&dimension_query(dimension, facts), self.config.retrieval_top_k)
                    .await;
                debug!(
                    "{} context for {}: {} entries ({:?})",
                    dimension,
                    facts.ticker,
                    retrieval.entries.len(),
                    retrieval.strategy
                );
                state.retrieved_context.insert(dimension, retrieval);
            }
        } else {
            debug!("Retrieval disabled for {}", facts.ticker);
        }

        let dimensions = state
            .retrieved_context
            .values()
            .filter(|r| !r.is_empty())
            .count();
        let entries = state.retrieved_context.values().map(|r| r.entries.len()).sum();
        finish(
            state,
            NodeId::Preparation,
            NodeResult::Prepared {
                dimensions,
                entries,
            },
        );
        step(state, PhaseEvent::Prepared);
    }

    /// Run the dimension nodes; returns `true` if the run was cancelled
    async fn analyze(
        &self,
        state: &mut WorkflowState,
        facts: &FinancialFacts,
        request: &RunRequest,
        signal: &CancellationSignal,
    ) -> bool {
        let env = NodeEnv {
            cache: self.cache.clone(),
            reasoner: Arc::clone(&request.reasoner),
            retry: self.config.retry_policy(),
            timeout: self.config.node_timeout,
            min_confidence: self.config.min_confidence,
            force_refresh: request.force_refresh,
        };
        let context: BTreeMap<Dimension, Retrieval> = state.retrieved_context.clone();

        let mut nodes = Vec::new();
        for node in NodeId::DIMENSIONS {
            match node.dimension().filter(|d| self.analyzers.contains_key(d)) {
                Some(_) => nodes.push(node),
                None => {
                    debug!("No analyzer registered for {}, skipping", node);
                    mark(state, node, NodeStatus::Skipped);
                }
            }
        }

        let env = &env;
        let context = &context;
        let cancelled = dispatch(
            nodes,
            self.mode,
            signal,
            |node: NodeId| {
                let analyzer = node
                    .dimension()
                    .and_then(|d| self.analyzers.get(&d))
                    .cloned();
                async move {
                    match analyzer {
                        Some(analyzer) => {
                            let retrieval = context.get(&analyzer.dimension());
                            run_dimension(env, analyzer.as_ref(), facts, retrieval).await
                        }
                        None => NodeReport {
                            output: None,
                            errors: Vec::new(),
                        },
                    }
                }
            },
            |event| match event {
                NodeEvent::Started(node) => {
                    debug!("{}: {} started", state.ticker, node);
                    mark(state, node, NodeStatus::Running);
                }
                NodeEvent::Finished(node, report) => record(state, node, report),
            },
        )
        .await;

        // Completion order varies between modes; the log is kept in node order
        state.errors.sort_by_key(|e| e.node);

        if !cancelled {
            step(state, PhaseEvent::AnalysisComplete);
        }
        cancelled
    }

    /// Aggregate the surviving scores
    async fn compile(&self, state: &mut WorkflowState, facts: &FinancialFacts, request: &RunRequest) {
        mark(state, NodeId::Compilation, NodeStatus::Running);

        if request.use_retrieval {
            let retrieval = self
                .retriever
                .query(&framework_query(facts), self.config.retrieval_top_k)
                .await;
            state.framework_context = Some(retrieval);
        }

        let scores = state.scores();
        let weighted_score = aggregate(&scores);

        let recommendation = if request.recommend {
            let completeness = Completeness {
                succeeded: state.dimensions_with(NodeStatus::Done),
                failed: state.dimensions_with(NodeStatus::Failed),
                stale: Dimension::ALL
                    .into_iter()
                    .filter(|d| {
                        state
                            .dimension_output(*d)
                            .is_some_and(|o: &DimensionOutput| o.origin == Origin::StaleCache)
                    })
                    .collect(),
                framework_context: state
                    .framework_context
                    .as_ref()
                    .map(Retrieval::snippets)
                    .unwrap_or_default(),
            };
            let recommendation = Recommendation::compile(&scores, completeness);
            if recommendation.is_none() {
                warn!("No dimension of {} produced a score", state.ticker);
                state.errors.push(ErrorEntry::warning(
                    NodeId::Compilation,
                    ErrorKind::DataUnavailable,
                    "no dimension produced a score, recommendation withheld",
                ));
            }
            recommendation
        } else {
            None
        };

        if let Some(rec) = &recommendation {
            info!(
                "{}: {} ({:.2}/10)",
                state.ticker,
                rec.tier(),
                rec.weighted_score()
            );
        }

        finish(
            state,
            NodeId::Compilation,
            NodeResult::Compiled {
                weighted_score,
                recommendation,
            },
        );
        step(state, PhaseEvent::Compiled);
    }

    /// Cache the terminal state so it can be queried later
    async fn persist(&self, state: &mut WorkflowState) {
        let stored = match serde_json::to_value(&*state) {
            Ok(value) => self.cache.put(&state.ticker, AnalysisType::Workflow, value).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = stored {
            warn!("Could not cache workflow state for {}: {}", state.ticker, e);
            state.errors.push(ErrorEntry::warning(
                NodeId::Compilation,
                ErrorKind::Persistence,
                e.to_string(),
            ));
        }
    }
}

/// Apply a dimension node's report to the state
fn record(state: &mut WorkflowState, node: NodeId, report: NodeReport) {
    state.errors.extend(report.errors);

    let written = match report.output {
        Some(output) => state.nodes.complete(&node, NodeResult::Dimension(output)),
        None => {
            warn!("{}: {} failed", state.ticker, node);
            let failed = state.nodes.fail(&node);
            step(state, PhaseEvent::NodeFailed);
            step(state, PhaseEvent::Recovered);
            failed
        }
    };

    if let Err(e) = written {
        debug!("Ignoring result for {}: {}", node, e);
    }
}

fn mark(state: &mut WorkflowState, node: NodeId, status: NodeStatus) {
    let changed = match status {
        NodeStatus::Running => state.nodes.start(&node),
        NodeStatus::Failed => state.nodes.fail(&node),
        NodeStatus::Skipped => state.nodes.skip(&node),
        NodeStatus::Pending | NodeStatus::Done => Ok(()),
    };
    if let Err(e) = changed {
        debug!("Slot update for {} ignored: {}", node, e);
    }
}

fn finish(state: &mut WorkflowState, node: NodeId, result: NodeResult) {
    if let Err(e) = state.nodes.complete(&node, result) {
        debug!("Slot update for {} ignored: {}", node, e);
    }
}

fn step(state: &mut WorkflowState, event: PhaseEvent) {
    if let Err(e) = state.advance(event) {
        warn!("{}: {}", state.ticker, e);
    }
}

/// Record a fatal validation error and end the run
fn abort(state: &mut WorkflowState, message: String) {
    error!("{}: {}", state.ticker, message);
    state.errors.push(ErrorEntry::new(
        NodeId::Validation,
        Severity::Fatal,
        ErrorKind::Validation,
        message,
    ));
    mark(state, NodeId::Validation, NodeStatus::Failed);
    step(state, PhaseEvent::NodeFailed);
    skip_unfinished(state);
    step(state, PhaseEvent::Abort);
}

/// Stop the run: pending nodes are skipped and running ones fail
fn cancel(state: &mut WorkflowState) {
    for node in state.nodes.unfinished() {
        if state.status(node) == Some(NodeStatus::Running) {
            state.errors.push(ErrorEntry::warning(
                node,
                ErrorKind::Cancelled,
                "cancelled while running",
            ));
            mark(state, node, NodeStatus::Failed);
        } else {
            mark(state, node, NodeStatus::Skipped);
        }
    }
    step(state, PhaseEvent::Cancel);
    info!("{}: run cancelled", state.ticker);
}

fn skip_unfinished(state: &mut WorkflowState) {
    for node in state.nodes.unfinished() {
        mark(state, node, NodeStatus::Skipped);
    }
}
