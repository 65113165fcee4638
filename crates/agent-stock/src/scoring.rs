//! Score aggregation and recommendation tiers
//!
//! Per-dimension scores are combined with fixed weights. Missing dimensions
//! are excluded and the remaining weights renormalized; they are never
//! counted as zero. The tier is a pure function of the weighted score.

use crate::dimension::Dimension;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Aggregated scores are snapped to a 1e-9 grid so that values such as 8.0
/// computed as 7.999999999999999 land in the right tier.
const SCORE_SCALE: f64 = 1e9;

/// Score produced by one analysis node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub dimension: Dimension,
    /// Always within [0, 10]
    pub value: f64,
    /// Always within [0, 1]
    pub confidence: f64,
}

impl ScoreRecord {
    /// Create a record, clamping `value` to [0, 10] and `confidence` to [0, 1]
    ///
    /// NaN inputs become 0.
    pub fn new(dimension: Dimension, value: f64, confidence: f64) -> Self {
        Self {
            dimension,
            value: clamp_or_zero(value, 10.0),
            confidence: clamp_or_zero(confidence, 1.0),
        }
    }
}

fn clamp_or_zero(x: f64, max: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, max) }
}

fn snap(x: f64) -> f64 {
    ((x * SCORE_SCALE).round() / SCORE_SCALE).clamp(0.0, 10.0)
}

/// Combine available dimension scores into a weighted score
///
/// Returns `None` when no dimension is present. When a dimension appears more
/// than once the last record wins.
pub fn aggregate(records: &[ScoreRecord]) -> Option<f64> {
    let by_dimension: BTreeMap<Dimension, f64> =
        records.iter().map(|r| (r.dimension, r.value)).collect();

    if by_dimension.is_empty() {
        return None;
    }

    let weighted: f64 = by_dimension.iter().map(|(d, v)| d.weight() * v).sum();

    if by_dimension.len() == Dimension::ALL.len() {
        return Some(snap(weighted));
    }

    let present_weight: f64 = by_dimension.keys().map(|d| d.weight()).sum();
    Some(snap(weighted / present_weight))
}

/// Recommendation tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "STRONG BUY")]
    StrongBuy,
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "WEAK HOLD")]
    WeakHold,
    #[serde(rename = "SELL")]
    Sell,
}

impl Tier {
    /// Map a weighted score to its tier (inclusive lower bounds)
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 8.0 => Self::StrongBuy,
            s if s >= 6.5 => Self::Buy,
            s if s >= 5.0 => Self::Hold,
            s if s >= 3.5 => Self::WeakHold,
            _ => Self::Sell,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StrongBuy => "STRONG BUY",
            Self::Buy => "BUY",
            Self::Hold => "HOLD",
            Self::WeakHold => "WEAK HOLD",
            Self::Sell => "SELL",
        }
    }

    /// Conviction attached to the tier
    pub fn confidence_label(self) -> &'static str {
        match self {
            Self::StrongBuy => "High",
            Self::Buy => "Medium-High",
            Self::Hold => "Medium",
            Self::WeakHold => "Medium-Low",
            Self::Sell => "High",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 7.5 {
            Self::Low
        } else if score >= 5.5 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Which dimensions contributed to a recommendation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Completeness {
    pub succeeded: Vec<Dimension>,
    pub failed: Vec<Dimension>,
    /// Subset of `succeeded` served from an outdated cache entry
    pub stale: Vec<Dimension>,
    /// Investment-framework knowledge retrieved for compilation
    pub framework_context: Vec<String>,
}

impl Completeness {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.succeeded.len() == Dimension::ALL.len()
    }
}

/// Final investment recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    tier: Tier,
    weighted_score: f64,
    pub rationale: String,
    pub confidence_label: String,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
    pub opportunity_factors: Vec<String>,
    pub scores: Vec<ScoreRecord>,
    pub completeness: Completeness,
}

impl Recommendation {
    /// Build a recommendation from the available scores
    ///
    /// Returns `None` when no dimension produced a score.
    pub fn compile(records: &[ScoreRecord], completeness: Completeness) -> Option<Self> {
        let weighted_score = aggregate(records)?;
        let tier = Tier::from_score(weighted_score);
        let risk_level = RiskLevel::from_score(weighted_score);

        let score_of = |dimension: Dimension| {
            records
                .iter()
                .rev()
                .find(|r| r.dimension == dimension)
                .map(|r| r.value)
        };

        let mut risk_factors = Vec::new();
        let mut opportunity_factors = Vec::new();

        if let Some(cash_flow) = score_of(Dimension::CashFlow) {
            if cash_flow < 5.0 {
                risk_factors.push("Low financial stability indicators".to_string());
            } else if cash_flow > 7.0 {
                opportunity_factors.push("Strong growth potential".to_string());
            }
        }
        if score_of(Dimension::Leadership).is_some_and(|s| s < 5.0) {
            risk_factors.push("Questionable leadership effectiveness".to_string());
        }
        if score_of(Dimension::Technology).is_some_and(|s| s > 7.0) {
            opportunity_factors.push("High innovation capacity".to_string());
        }
        if let Some(sentiment) = score_of(Dimension::Sentiment) {
            if sentiment < 4.0 {
                risk_factors.push("Negative market sentiment".to_string());
            } else if sentiment > 6.0 {
                opportunity_factors.push("Positive market sentiment".to_string());
            }
        }

        let rationale = build_rationale(
            weighted_score,
            tier,
            risk_level,
            &completeness,
            &risk_factors,
            &opportunity_factors,
        );

        Some(Self {
            tier,
            weighted_score,
            rationale,
            confidence_label: tier.confidence_label().to_string(),
            risk_level,
            risk_factors,
            opportunity_factors,
            scores: records.to_vec(),
            completeness,
        })
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn weighted_score(&self) -> f64 {
        self.weighted_score
    }
}

fn build_rationale(
    score: f64,
    tier: Tier,
    risk: RiskLevel,
    completeness: &Completeness,
    risks: &[String],
    opportunities: &[String],
) -> String {
    let mut text = format!(
        "Weighted score {:.2}/10 from {} of {} dimensions maps to {} ({} confidence, {} risk).",
        score,
        completeness.succeeded.len(),
        Dimension::ALL.len(),
        tier,
        tier.confidence_label(),
        risk.as_str(),
    );

    if !completeness.failed.is_empty() {
        let missing: Vec<&str> = completeness.failed.iter().map(|d| d.as_str()).collect();
        text.push_str(&format!(
            " Excluded after failure: {}; remaining weights renormalized.",
            missing.join(", ")
        ));
    }
    if !completeness.stale.is_empty() {
        let stale: Vec<&str> = completeness.stale.iter().map(|d| d.as_str()).collect();
        text.push_str(&format!(
            " Based on outdated cached data: {}.",
            stale.join(", ")
        ));
    }
    if !opportunities.is_empty() {
        text.push_str(&format!(" Opportunities: {}.", opportunities.join(", ")));
    }
    if !risks.is_empty() {
        text.push_str(&format!(" Risks: {}.", risks.join(", ")));
    }

    text
}
