//! Freshness-bounded cache for analysis payloads
//!
//! Entries are keyed by ticker and analysis type. An entry younger than the
//! freshness window is a hit; older entries are kept and can still be read
//! through [`CacheManager::get_allow_stale`], which marks them stale. When a
//! root directory is configured every write is mirrored to
//! `<root>/<TICKER>/<YYYY-MM-DD>/<analysis_type>.json`.

use crate::dimension::Dimension;
use crate::error::{Result, StockError};
use cached::{Cached, UnboundCache};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Kind of payload stored in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    CashFlow,
    Profit,
    Leadership,
    Technology,
    Sentiment,
    /// Terminal workflow state of a run
    Workflow,
}

impl AnalysisType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CashFlow => "cash_flow",
            Self::Profit => "profit",
            Self::Leadership => "leadership",
            Self::Technology => "technology",
            Self::Sentiment => "sentiment",
            Self::Workflow => "workflow",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        [
            Self::CashFlow,
            Self::Profit,
            Self::Leadership,
            Self::Technology,
            Self::Sentiment,
            Self::Workflow,
        ]
        .into_iter()
        .find(|t| t.as_str() == name)
    }
}

impl From<Dimension> for AnalysisType {
    fn from(dimension: Dimension) -> Self {
        match dimension {
            Dimension::CashFlow => Self::CashFlow,
            Dimension::Profit => Self::Profit,
            Dimension::Leadership => Self::Leadership,
            Dimension::Technology => Self::Technology,
            Dimension::Sentiment => Self::Sentiment,
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key for analysis payloads
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub ticker: String,
    pub analysis_type: AnalysisType,
}

impl CacheKey {
    pub fn new(ticker: impl Into<String>, analysis_type: AnalysisType) -> Self {
        Self {
            ticker: ticker.into(),
            analysis_type,
        }
    }
}

/// A cached payload
///
/// Entries are never mutated in place; a write replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub ticker: String,
    pub analysis_type: AnalysisType,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    /// Set on copies handed out by the allow-stale path
    #[serde(default)]
    pub stale: bool,
}

impl CacheEntry {
    pub fn new(
        ticker: impl Into<String>,
        analysis_type: AnalysisType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            analysis_type,
            timestamp: Utc::now(),
            payload,
            stale: false,
        }
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_fresh(&self, window: Duration, now: DateTime<Utc>) -> bool {
        let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(self.timestamp) < window
    }

    /// Date bucket used in the on-disk layout
    pub fn date_bucket(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }

    fn key(&self) -> CacheKey {
        CacheKey::new(self.ticker.clone(), self.analysis_type)
    }
}

/// Thread-safe cache for analysis payloads
pub struct CacheManager {
    entries: Arc<RwLock<UnboundCache<CacheKey, CacheEntry>>>,
    freshness_window: Duration,
    root: Option<PathBuf>,
}

impl CacheManager {
    /// Create an in-memory cache with the given freshness window
    pub fn new(freshness_window: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(UnboundCache::new())),
            freshness_window,
            root: None,
        }
    }

    /// Mirror writes under `root`
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    /// Fresh entry for the key, if any
    pub async fn get(&self, ticker: &str, analysis_type: AnalysisType) -> Option<CacheEntry> {
        self.get_at(ticker, analysis_type, Utc::now()).await
    }

    /// Fresh entry relative to `now`
    pub async fn get_at(
        &self,
        ticker: &str,
        analysis_type: AnalysisType,
        now: DateTime<Utc>,
    ) -> Option<CacheEntry> {
        let key = CacheKey::new(ticker, analysis_type);
        let mut cache = self.entries.write().await;

        match cache.cache_get(&key) {
            Some(entry) if entry.is_fresh(self.freshness_window, now) => {
                debug!("Cache hit for {}/{}", ticker, analysis_type);
                Some(entry.clone())
            }
            Some(_) => {
                debug!("Cache entry for {}/{} is outdated", ticker, analysis_type);
                None
            }
            None => {
                debug!("Cache miss for {}/{}", ticker, analysis_type);
                None
            }
        }
    }

    /// Entry for the key regardless of age
    ///
    /// Outdated entries are returned with `stale = true`.
    pub async fn get_allow_stale(
        &self,
        ticker: &str,
        analysis_type: AnalysisType,
    ) -> Option<CacheEntry> {
        self.get_allow_stale_at(ticker, analysis_type, Utc::now())
            .await
    }

    pub async fn get_allow_stale_at(
        &self,
        ticker: &str,
        analysis_type: AnalysisType,
        now: DateTime<Utc>,
    ) -> Option<CacheEntry> {
        let key = CacheKey::new(ticker, analysis_type);
        let mut cache = self.entries.write().await;

        cache.cache_get(&key).map(|entry| {
            let mut entry = entry.clone();
            entry.stale = !entry.is_fresh(self.freshness_window, now);
            entry
        })
    }

    /// Store `payload`, replacing any previous entry for the key
    pub async fn put(
        &self,
        ticker: &str,
        analysis_type: AnalysisType,
        payload: serde_json::Value,
    ) -> Result<CacheEntry> {
        let entry = CacheEntry::new(ticker, analysis_type, payload);
        self.put_entry(entry.clone()).await?;
        Ok(entry)
    }

    /// Store a prepared entry, replacing any previous entry for its key
    ///
    /// The in-memory write always happens; a persistence failure is reported
    /// afterwards.
    pub async fn put_entry(&self, mut entry: CacheEntry) -> Result<()> {
        entry.stale = false;
        {
            let mut cache = self.entries.write().await;
            let _ = cache.cache_set(entry.key(), entry.clone());
        }

        if let Some(root) = &self.root {
            persist(root, &entry).await?;
        }
        Ok(())
    }

    /// Restore persisted entries from the configured root
    ///
    /// When a key appears in several date buckets the newest entry wins.
    /// Unreadable files are skipped. Returns the number of entries loaded.
    pub async fn load_dir(&self) -> Result<usize> {
        let Some(root) = &self.root else {
            return Ok(0);
        };
        if !tokio::fs::try_exists(root).await? {
            return Ok(0);
        }

        let mut loaded = 0;
        for file in json_files(root).await? {
            let entry = match read_entry(&file).await {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping cache file {}: {}", file.display(), e);
                    continue;
                }
            };

            let mut cache = self.entries.write().await;
            let newer = cache
                .cache_get(&entry.key())
                .is_none_or(|existing| existing.timestamp < entry.timestamp);
            if newer {
                let _ = cache.cache_set(entry.key(), entry);
                loaded += 1;
            }
        }

        debug!("Loaded {} cache entries from {}", loaded, root.display());
        Ok(loaded)
    }

    /// Remove the entry for the key
    pub async fn invalidate(&self, ticker: &str, analysis_type: AnalysisType) {
        let mut cache = self.entries.write().await;
        let _ = cache.cache_remove(&CacheKey::new(ticker, analysis_type));
    }

    /// Number of entries held in memory
    pub async fn len(&self) -> usize {
        let cache = self.entries.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Clone for CacheManager {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            freshness_window: self.freshness_window,
            root: self.root.clone(),
        }
    }
}

fn entry_path(root: &Path, entry: &CacheEntry) -> PathBuf {
    root.join(&entry.ticker)
        .join(entry.date_bucket())
        .join(format!("{}.json", entry.analysis_type))
}

async fn persist(root: &Path, entry: &CacheEntry) -> Result<()> {
    let path = entry_path(root, entry);
    let persistence = |e: std::io::Error| StockError::Persistence(format!("{}: {}", path.display(), e));

    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(persistence)?;
    }
    let body = serde_json::to_vec_pretty(entry)?;
    tokio::fs::write(&path, body).await.map_err(persistence)?;

    debug!("Persisted cache entry to {}", path.display());
    Ok(())
}

async fn read_entry(path: &Path) -> Result<CacheEntry> {
    let body = tokio::fs::read(path).await?;
    let entry: CacheEntry = serde_json::from_slice(&body)?;

    let expected = path.file_stem().and_then(|s| s.to_str());
    if expected.and_then(AnalysisType::parse) != Some(entry.analysis_type) {
        return Err(StockError::Persistence(format!(
            "{} does not match its analysis type {}",
            path.display(),
            entry.analysis_type
        )));
    }
    Ok(entry)
}

/// `<root>/<ticker>/<date>/*.json`
async fn json_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for ticker_dir in subdirs(root).await? {
        for date_dir in subdirs(&ticker_dir).await? {
            let mut dir = tokio::fs::read_dir(&date_dir).await?;
            while let Some(item) = dir.next_entry().await? {
                let path = item.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    files.push(path);
                }
            }
        }
    }
    files.sort();
    Ok(files)
}

async fn subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(item) = entries.next_entry().await? {
        if item.file_type().await?.is_dir() {
            out.push(item.path());
        }
    }
    Ok(out)
}
