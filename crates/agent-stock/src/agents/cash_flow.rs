//! Cash flow and R&D investment

use super::{DimensionAnalyzer, Evidence, percent};
use crate::dimension::Dimension;
use agent_core::{CollaboratorError, FinancialFacts};
use async_trait::async_trait;
use serde_json::json;

const TEMPLATE: &str = r"You are assessing the cash generation and reinvestment profile of {{ company }} ({{ ticker }}).
{% if snippets %}
Reference knowledge:
{% for s in snippets %}- {{ s }}
{% endfor %}{% endif %}
Revenue by period (most recent first):
{% for p in metrics.periods %}- {{ p.label }}: revenue {{ p.revenue | num }}, R&D {{ p.research_and_development | num }}, R&D/revenue {{ p.rd_ratio | pct }}, YoY growth {{ p.yoy_growth | pct }}
{% endfor %}
Average R&D/revenue: {{ metrics.avg_rd_ratio | pct }}
Future focus score: {{ metrics.future_focus_score }}/10

Judge how sustainably the company funds its future. Score from 0 (weak) to 10 (strong).";

/// Score for the average R&D-to-revenue percentage
pub fn future_focus_score(avg_rd_ratio: f64) -> u8 {
    if avg_rd_ratio > 15.0 {
        9
    } else if avg_rd_ratio > 10.0 {
        7
    } else if avg_rd_ratio > 5.0 {
        5
    } else {
        3
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CashFlowAnalyzer;

#[async_trait]
impl DimensionAnalyzer for CashFlowAnalyzer {
    fn dimension(&self) -> Dimension {
        Dimension::CashFlow
    }

    fn template(&self) -> &'static str {
        TEMPLATE
    }

    async fn collect(&self, facts: &FinancialFacts) -> Result<Evidence, CollaboratorError> {
        let periods: Vec<_> = facts.periods.iter().filter(|p| p.revenue.is_some()).collect();
        if periods.is_empty() {
            return Err(CollaboratorError::DataUnavailable(format!(
                "no revenue data for {}",
                facts.ticker
            )));
        }

        let mut rows = Vec::with_capacity(periods.len());
        let mut ratios = Vec::new();
        for (i, period) in periods.iter().enumerate() {
            let rd_ratio = percent(period.research_and_development, period.revenue);
            let yoy_growth = periods.get(i + 1).and_then(|prior| {
                percent(
                    period.revenue.zip(prior.revenue).map(|(now, before)| now - before),
                    prior.revenue,
                )
            });
            if let Some(ratio) = rd_ratio {
                ratios.push(ratio);
            }
            rows.push(json!({
                "label": period.label,
                "revenue": period.revenue,
                "research_and_development": period.research_and_development,
                "rd_ratio": rd_ratio,
                "yoy_growth": yoy_growth,
            }));
        }

        let avg_rd_ratio = if ratios.is_empty() {
            None
        } else {
            Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
        };

        let confidence = if periods.len() >= 2 { 1.0 } else { 0.6 };

        Ok(Evidence::new(
            json!({
                "periods": rows,
                "avg_rd_ratio": avg_rd_ratio,
                "future_focus_score": future_focus_score(avg_rd_ratio.unwrap_or(0.0)),
            }),
            confidence,
        ))
    }
}
