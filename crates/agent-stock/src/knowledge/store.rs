//! Categorized knowledge snippets
//!
//! The store is append-only: entries are never edited or removed once
//! ingested, so their position doubles as insertion order for tie-breaking.

use crate::error::{Result, StockError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Closed set of knowledge categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeCategory {
    FinancialRatios,
    RdBenchmarks,
    Leadership,
    Technology,
    Sentiment,
    InvestmentFramework,
}

impl KnowledgeCategory {
    pub const ALL: [KnowledgeCategory; 6] = [
        Self::FinancialRatios,
        Self::RdBenchmarks,
        Self::Leadership,
        Self::Technology,
        Self::Sentiment,
        Self::InvestmentFramework,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FinancialRatios => "financial_ratios",
            Self::RdBenchmarks => "rd_benchmarks",
            Self::Leadership => "leadership",
            Self::Technology => "technology",
            Self::Sentiment => "sentiment",
            Self::InvestmentFramework => "investment_framework",
        }
    }
}

impl fmt::Display for KnowledgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reference snippet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Insertion sequence number
    pub id: u64,
    pub category: KnowledgeCategory,
    pub text: String,
    /// Relative importance in [0, 1]
    pub importance: f64,
    /// Precomputed embedding, if the producer supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub added_at: DateTime<Utc>,
}

const DEFAULT_KNOWLEDGE: [(KnowledgeCategory, &str, f64); 6] = [
    (
        KnowledgeCategory::FinancialRatios,
        "Financial ratio analysis: Current ratio measures liquidity (current assets / current liabilities). Above 1.5 is generally good.",
        0.8,
    ),
    (
        KnowledgeCategory::RdBenchmarks,
        "R&D spending analysis: Companies spending >15% of revenue on R&D are typically innovation-focused. Tech companies average 10-20%.",
        0.9,
    ),
    (
        KnowledgeCategory::Leadership,
        "CEO leadership assessment: Look for track record, tenure, strategic vision, and ability to execute. Previous company performance is key indicator.",
        0.7,
    ),
    (
        KnowledgeCategory::Technology,
        "Technology competitive advantage: Patent portfolio strength, R&D efficiency, and market adoption rate of innovations are key metrics.",
        0.8,
    ),
    (
        KnowledgeCategory::Sentiment,
        "Sentiment analysis interpretation: Social media sentiment should be weighted less than news sentiment. Look for sentiment trend changes over time.",
        0.6,
    ),
    (
        KnowledgeCategory::InvestmentFramework,
        "Investment recommendation framework: Consider growth potential, financial stability, leadership quality, competitive position, and market sentiment.",
        1.0,
    ),
];

#[derive(Serialize, Deserialize)]
struct StoreFile {
    entries: Vec<KnowledgeEntry>,
    saved_at: DateTime<Utc>,
}

/// Append-only collection of knowledge entries
#[derive(Debug, Clone, Default)]
pub struct KnowledgeStore {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with one benchmark entry per category
    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        for (category, text, importance) in DEFAULT_KNOWLEDGE {
            store.ingest_with(category, text, importance, None);
        }
        store
    }

    /// Append an entry with neutral importance
    pub fn ingest(&mut self, category: KnowledgeCategory, text: impl Into<String>) -> KnowledgeEntry {
        self.ingest_with(category, text, 0.5, None)
    }

    /// Append an entry
    pub fn ingest_with(
        &mut self,
        category: KnowledgeCategory,
        text: impl Into<String>,
        importance: f64,
        embedding: Option<Vec<f32>>,
    ) -> KnowledgeEntry {
        let entry = KnowledgeEntry {
            id: self.entries.len() as u64,
            category,
            text: text.into(),
            importance: importance.clamp(0.0, 1.0),
            embedding,
            added_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        entry
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn by_category(&self, category: KnowledgeCategory) -> impl Iterator<Item = &KnowledgeEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the store as JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        let file = StoreFile {
            entries: self.entries.clone(),
            saved_at: Utc::now(),
        };
        let body = serde_json::to_vec_pretty(&file)?;

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, body)
            .await
            .map_err(|e| StockError::Persistence(format!("{}: {}", path.display(), e)))?;

        debug!("Saved {} knowledge entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a store written by [`save`](Self::save)
    pub async fn load(path: &Path) -> Result<Self> {
        let body = tokio::fs::read(path).await?;
        let file: StoreFile = serde_json::from_slice(&body)?;

        // Ids are reassigned so that they keep matching insertion order.
        let entries = file
            .entries
            .into_iter()
            .enumerate()
            .map(|(i, mut entry)| {
                entry.id = i as u64;
                entry
            })
            .collect();

        Ok(Self { entries })
    }

    /// Load from `path`, falling back to the default seed
    pub async fn load_or_default(path: &Path) -> Self {
        match Self::load(path).await {
            Ok(store) => store,
            Err(e) => {
                warn!(
                    "Could not load knowledge from {}: {}. Using defaults",
                    path.display(),
                    e
                );
                Self::with_defaults()
            }
        }
    }
}
