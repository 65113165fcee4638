//! Configuration for ticker analysis runs

use crate::error::{Result, StockError};
use agent_utils::{env_flag, env_parse, env_string};
use agent_workflow::{ExecutionMode, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Configuration for ticker analysis runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Age below which a cached payload counts as fresh
    pub freshness_window: Duration,

    /// Retries after the first attempt for transient collaborator failures
    pub max_retries: u32,

    /// Initial backoff duration for retries
    pub retry_backoff_base: Duration,

    /// Upper bound on a single backoff
    pub max_backoff: Duration,

    /// Timeout for each collaborator call made by a node
    pub node_timeout: Duration,

    /// Analysis nodes allowed in flight; 1 runs them sequentially
    pub max_concurrency: usize,

    /// Knowledge entries retrieved per dimension
    pub retrieval_top_k: usize,

    /// Reasoning results below this confidence are rejected
    pub min_confidence: f64,

    /// Default for the per-request retrieval flag
    pub use_retrieval: bool,

    /// Root of the persisted cache, if any
    pub cache_dir: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(15 * SECONDS_PER_DAY),
            max_retries: 3,
            retry_backoff_base: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            node_timeout: Duration::from_secs(60),
            max_concurrency: 5,
            retrieval_top_k: 2,
            min_confidence: 0.0,
            use_retrieval: true,
            cache_dir: None,
        }
    }
}

impl AnalyzerConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder::default()
    }

    /// Defaults overridden by `TICKER_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env()?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.freshness_window.is_zero() {
            return Err(StockError::Config(
                "freshness_window must be greater than 0".to_string(),
            ));
        }

        if self.max_retries == 0 {
            return Err(StockError::Config(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if self.node_timeout.is_zero() {
            return Err(StockError::Config(
                "node_timeout must be greater than 0".to_string(),
            ));
        }

        if self.retrieval_top_k == 0 {
            return Err(StockError::Config(
                "retrieval_top_k must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(StockError::Config(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }

        Ok(())
    }

    /// Retry policy for collaborator calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries + 1,
            self.retry_backoff_base,
            self.max_backoff,
            2.0,
        )
    }

    /// How the analysis nodes are scheduled
    pub fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::from_concurrency(self.max_concurrency)
    }
}

/// Builder for AnalyzerConfig
#[derive(Debug, Default)]
pub struct AnalyzerConfigBuilder {
    freshness_window: Option<Duration>,
    max_retries: Option<u32>,
    retry_backoff_base: Option<Duration>,
    max_backoff: Option<Duration>,
    node_timeout: Option<Duration>,
    max_concurrency: Option<usize>,
    retrieval_top_k: Option<usize>,
    min_confidence: Option<f64>,
    use_retrieval: Option<bool>,
    cache_dir: Option<PathBuf>,
}

impl AnalyzerConfigBuilder {
    pub fn freshness_window(mut self, duration: Duration) -> Self {
        self.freshness_window = Some(duration);
        self
    }

    /// Set the freshness window in whole days
    pub fn freshness_days(self, days: u64) -> Self {
        self.freshness_window(Duration::from_secs(days * SECONDS_PER_DAY))
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    pub fn max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = Some(duration);
        self
    }

    pub fn node_timeout(mut self, duration: Duration) -> Self {
        self.node_timeout = Some(duration);
        self
    }

    pub fn max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = Some(workers);
        self
    }

    pub fn retrieval_top_k(mut self, k: usize) -> Self {
        self.retrieval_top_k = Some(k);
        self
    }

    pub fn min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = Some(confidence);
        self
    }

    pub fn use_retrieval(mut self, enabled: bool) -> Self {
        self.use_retrieval = Some(enabled);
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Apply `TICKER_*` environment overrides
    pub fn with_env(mut self) -> Result<Self> {
        if let Some(days) = env_parse::<u64>("TICKER_FRESHNESS_DAYS")? {
            self = self.freshness_days(days);
        }
        if let Some(retries) = env_parse("TICKER_MAX_RETRIES")? {
            self.max_retries = Some(retries);
        }
        if let Some(ms) = env_parse::<u64>("TICKER_RETRY_BACKOFF_MS")? {
            self.retry_backoff_base = Some(Duration::from_millis(ms));
        }
        if let Some(secs) = env_parse::<u64>("TICKER_NODE_TIMEOUT_SECS")? {
            self.node_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(workers) = env_parse("TICKER_MAX_CONCURRENCY")? {
            self.max_concurrency = Some(workers);
        }
        if let Some(k) = env_parse("TICKER_RETRIEVAL_TOP_K")? {
            self.retrieval_top_k = Some(k);
        }
        if let Some(confidence) = env_parse("TICKER_MIN_CONFIDENCE")? {
            self.min_confidence = Some(confidence);
        }
        if let Some(enabled) = env_flag("TICKER_USE_RETRIEVAL")? {
            self.use_retrieval = Some(enabled);
        }
        if let Some(dir) = env_string("TICKER_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<AnalyzerConfig> {
        let defaults = AnalyzerConfig::default();

        let config = AnalyzerConfig {
            freshness_window: self.freshness_window.unwrap_or(defaults.freshness_window),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff_base: self
                .retry_backoff_base
                .unwrap_or(defaults.retry_backoff_base),
            max_backoff: self.max_backoff.unwrap_or(defaults.max_backoff),
            node_timeout: self.node_timeout.unwrap_or(defaults.node_timeout),
            max_concurrency: self.max_concurrency.unwrap_or(defaults.max_concurrency),
            retrieval_top_k: self.retrieval_top_k.unwrap_or(defaults.retrieval_top_k),
            min_confidence: self.min_confidence.unwrap_or(defaults.min_confidence),
            use_retrieval: self.use_retrieval.unwrap_or(defaults.use_retrieval),
            cache_dir: self.cache_dir,
        };

        config.validate()?;
        Ok(config)
    }
}
