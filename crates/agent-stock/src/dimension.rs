//! The five fixed analysis dimensions

use serde::{Deserialize, Serialize};
use std::fmt;

/// One analysis axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    CashFlow,
    Profit,
    Leadership,
    Technology,
    Sentiment,
}

impl Dimension {
    /// All dimensions in workflow order
    pub const ALL: [Dimension; 5] = [
        Dimension::CashFlow,
        Dimension::Profit,
        Dimension::Leadership,
        Dimension::Technology,
        Dimension::Sentiment,
    ];

    /// Fixed aggregation weight; the five weights sum to 1
    pub fn weight(self) -> f64 {
        match self {
            Self::CashFlow => 0.25,
            Self::Profit => 0.20,
            Self::Leadership => 0.20,
            Self::Technology => 0.20,
            Self::Sentiment => 0.15,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CashFlow => "cash_flow",
            Self::Profit => "profit",
            Self::Leadership => "leadership",
            Self::Technology => "technology",
            Self::Sentiment => "sentiment",
        }
    }

    /// Human readable name
    pub fn label(self) -> &'static str {
        match self {
            Self::CashFlow => "Cash Flow",
            Self::Profit => "Profitability",
            Self::Leadership => "Leadership",
            Self::Technology => "Technology & IP",
            Self::Sentiment => "Market Sentiment",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
