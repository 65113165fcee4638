//! Execution of a single dimension node
//!
//! A node first consults the cache. On a miss it collects evidence, renders
//! the prompt and calls the reasoning capability, retrying transient
//! failures with backoff and bounding every collaborator call by the node
//! timeout. A failed computation falls back to an outdated cache entry when
//! one exists.

use super::state::{
    DimensionOutput, DimensionPayload, ErrorEntry, ErrorKind, NodeId, Origin,
};
use crate::agents::{DimensionAnalyzer, prompt};
use crate::cache::{AnalysisType, CacheEntry, CacheManager};
use crate::knowledge::Retrieval;
use crate::scoring::ScoreRecord;
use agent_core::{CollaboratorError, FinancialFacts, PromptContext, ReasoningProvider};
use agent_workflow::RetryPolicy;
use chrono::Utc;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Everything a dimension node needs besides its analyzer
pub(crate) struct NodeEnv {
    pub cache: CacheManager,
    pub reasoner: Arc<dyn ReasoningProvider>,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub min_confidence: f64,
    pub force_refresh: bool,
}

/// Outcome of one dimension node
#[derive(Debug)]
pub(crate) struct NodeReport {
    pub output: Option<DimensionOutput>,
    pub errors: Vec<ErrorEntry>,
}

/// Bound a collaborator call by `limit`
pub(crate) async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| CollaboratorError::Timeout(limit))?
}

fn kind_of(err: &CollaboratorError) -> ErrorKind {
    match err {
        CollaboratorError::CapabilityUnavailable(_) => ErrorKind::CapabilityUnavailable,
        e if e.is_transient() => ErrorKind::TransientIo,
        _ => ErrorKind::DataUnavailable,
    }
}

fn decode(entry: &CacheEntry) -> Option<DimensionPayload> {
    match serde_json::from_value(entry.payload.clone()) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!(
                "Ignoring unreadable cache entry for {}/{}: {}",
                entry.ticker, entry.analysis_type, e
            );
            None
        }
    }
}

/// Run the node for `analyzer`'s dimension
pub(crate) async fn run_dimension(
    env: &NodeEnv,
    analyzer: &dyn DimensionAnalyzer,
    facts: &FinancialFacts,
    retrieval: Option<&Retrieval>,
) -> NodeReport {
    let dimension = analyzer.dimension();
    let node = NodeId::from(dimension);
    let analysis_type = AnalysisType::from(dimension);
    let ticker = facts.ticker.as_str();
    let mut errors = Vec::new();

    if !env.force_refresh {
        if let Some(payload) = env
            .cache
            .get(ticker, analysis_type)
            .await
            .as_ref()
            .and_then(decode)
        {
            return NodeReport {
                output: Some(DimensionOutput {
                    payload,
                    origin: Origin::FreshCache,
                }),
                errors,
            };
        }
    }

    let operation = format!("{ticker}/{dimension}");
    let computed = env
        .retry
        .execute_observed(
            &operation,
            || compute(env, analyzer, facts, retrieval),
            |attempt, e: &CollaboratorError| {
                errors.push(ErrorEntry::warning(node, kind_of(e), e.to_string()).with_attempt(attempt));
            },
        )
        .await;

    match computed {
        Ok(payload) => {
            match serde_json::to_value(&payload) {
                Ok(value) => {
                    if let Err(e) = env.cache.put(ticker, analysis_type, value).await {
                        warn!("Could not persist {} result: {}", operation, e);
                        errors.push(ErrorEntry::warning(node, ErrorKind::Persistence, e.to_string()));
                    }
                }
                Err(e) => warn!("Could not encode {} result: {}", operation, e),
            }

            NodeReport {
                output: Some(DimensionOutput {
                    payload,
                    origin: Origin::Computed,
                }),
                errors,
            }
        }
        Err(e) => {
            if e.is_transient() {
                errors.push(ErrorEntry::warning(
                    node,
                    ErrorKind::DataUnavailable,
                    format!("retries exhausted: {e}"),
                ));
            }

            let fallback = env
                .cache
                .get_allow_stale(ticker, analysis_type)
                .await
                .and_then(|entry| decode(&entry).map(|payload| (entry.stale, payload)));

            match fallback {
                Some((stale, payload)) => {
                    warn!("{} failed, serving cached result (stale: {})", operation, stale);
                    errors.push(ErrorEntry::warning(
                        node,
                        ErrorKind::DataUnavailable,
                        "served from cache after failure",
                    ));
                    NodeReport {
                        output: Some(DimensionOutput {
                            payload,
                            origin: if stale { Origin::StaleCache } else { Origin::FreshCache },
                        }),
                        errors,
                    }
                }
                None => {
                    warn!("{} failed: {}", operation, e);
                    NodeReport {
                        output: None,
                        errors,
                    }
                }
            }
        }
    }
}

/// One attempt at computing the dimension
async fn compute(
    env: &NodeEnv,
    analyzer: &dyn DimensionAnalyzer,
    facts: &FinancialFacts,
    retrieval: Option<&Retrieval>,
) -> Result<DimensionPayload, CollaboratorError> {
    let dimension = analyzer.dimension();
    let evidence = with_timeout(env.timeout, analyzer.collect(facts)).await?;

    let snippets = retrieval.map(Retrieval::snippets).unwrap_or_default();
    let vars = json!({
        "ticker": facts.ticker,
        "company": facts.display_name(),
        "metrics": evidence.metrics,
        "snippets": snippets,
    });
    let rendered = prompt::render(analyzer.template(), &vars)
        .map_err(|e| CollaboratorError::DataUnavailable(e.to_string()))?;

    let mut context = PromptContext::new()
        .with_ticker(&facts.ticker)
        .with_dimension(dimension.as_str())
        .with_company(facts.display_name())
        .with_snippets(snippets);
    if let Some(retrieval) = retrieval {
        context.insert(
            agent_core::context::keys::RETRIEVAL_STRATEGY,
            json!(retrieval.strategy),
        );
    }

    let reasoning = with_timeout(env.timeout, env.reasoner.generate(&rendered, &context)).await?;

    if !reasoning.score.is_finite() {
        return Err(CollaboratorError::DataUnavailable(format!(
            "reasoning returned a non-numeric {dimension} score"
        )));
    }

    let confidence = reasoning.confidence.min(evidence.confidence);
    if confidence < env.min_confidence {
        return Err(CollaboratorError::DataUnavailable(format!(
            "{dimension} confidence {confidence:.2} below minimum {:.2}",
            env.min_confidence
        )));
    }

    debug!(
        "{}/{} scored {:.2} (confidence {:.2})",
        facts.ticker, dimension, reasoning.score, confidence
    );

    Ok(DimensionPayload {
        score: ScoreRecord::new(dimension, reasoning.score, confidence),
        narrative: reasoning.narrative,
        metrics: evidence.metrics,
        computed_at: Utc::now(),
    })
}
