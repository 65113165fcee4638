//! Market data collaborator contracts

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One reporting period of financial statement data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialPeriod {
    /// Period label, e.g. "2024-09-30"
    pub label: String,
    pub revenue: Option<f64>,
    pub research_and_development: Option<f64>,
    pub gross_profit: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
}

/// Structured financial facts about a company
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialFacts {
    pub ticker: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub ceo_name: Option<String>,
    pub business_summary: Option<String>,
    pub market_cap: Option<f64>,
    /// Return on equity as a fraction (0.15 = 15%)
    pub return_on_equity: Option<f64>,
    /// Granted patents, when the provider knows
    pub patent_count: Option<u32>,
    /// Statement periods, most recent first
    pub periods: Vec<FinancialPeriod>,
}

impl FinancialFacts {
    /// Create facts for a ticker with no data attached
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Self::default()
        }
    }

    /// Company name, falling back to the ticker
    pub fn display_name(&self) -> &str {
        self.company_name.as_deref().unwrap_or(&self.ticker)
    }

    /// Most recent period, if any
    pub fn latest(&self) -> Option<&FinancialPeriod> {
        self.periods.first()
    }
}

/// Source of fetched financial facts
#[async_trait]
pub trait FinancialDataProvider: Send + Sync {
    /// Fetch facts for `ticker`
    ///
    /// Unknown tickers are reported as [`crate::CollaboratorError::DataUnavailable`].
    async fn fetch(&self, ticker: &str) -> Result<FinancialFacts>;
}

/// Where a sentiment document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    News,
    Social,
}

/// Raw document used for sentiment analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentDocument {
    pub source: DocumentSource,
    pub title: String,
    pub text: String,
    /// Polarity in [-1, 1] when the provider scored the document
    pub polarity: Option<f64>,
}

impl SentimentDocument {
    /// Create a document with a polarity score
    pub fn scored(source: DocumentSource, title: impl Into<String>, polarity: f64) -> Self {
        Self {
            source,
            title: title.into(),
            text: String::new(),
            polarity: Some(polarity),
        }
    }
}

/// Source of news and social-media documents
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    /// Fetch recent documents mentioning `ticker`
    async fn fetch(&self, ticker: &str) -> Result<Vec<SentimentDocument>>;
}
