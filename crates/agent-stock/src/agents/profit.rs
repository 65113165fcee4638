//! Profitability ratios

use super::{DimensionAnalyzer, Evidence, percent};
use crate::dimension::Dimension;
use agent_core::{CollaboratorError, FinancialFacts};
use async_trait::async_trait;
use serde_json::json;

const TEMPLATE: &str = r"Evaluate the profitability of {{ company }} ({{ ticker }}) for period {{ metrics.period }}.
{% if snippets %}
Reference knowledge:
{% for s in snippets %}- {{ s }}
{% endfor %}{% endif %}
Gross margin: {{ metrics.gross_margin | pct }}
Operating margin: {{ metrics.operating_margin | pct }}
Net margin: {{ metrics.net_margin | pct }}
Return on equity: {{ metrics.return_on_equity | pct }}

Compare these against typical levels for the industry. Score from 0 (unprofitable) to 10 (exceptional).";

#[derive(Debug, Clone, Copy, Default)]
pub struct ProfitAnalyzer;

#[async_trait]
impl DimensionAnalyzer for ProfitAnalyzer {
    fn dimension(&self) -> Dimension {
        Dimension::Profit
    }

    fn template(&self) -> &'static str {
        TEMPLATE
    }

    async fn collect(&self, facts: &FinancialFacts) -> Result<Evidence, CollaboratorError> {
        let latest = facts
            .periods
            .iter()
            .find(|p| p.revenue.is_some_and(|r| r > 0.0))
            .ok_or_else(|| {
                CollaboratorError::DataUnavailable(format!(
                    "no positive revenue reported for {}",
                    facts.ticker
                ))
            })?;

        let gross_margin = percent(latest.gross_profit, latest.revenue);
        let operating_margin = percent(latest.operating_income, latest.revenue);
        let net_margin = percent(latest.net_income, latest.revenue);
        let return_on_equity = facts.return_on_equity.map(|roe| roe * 100.0);

        let known = [gross_margin, operating_margin, net_margin, return_on_equity]
            .iter()
            .filter(|m| m.is_some())
            .count();
        if known == 0 {
            return Err(CollaboratorError::DataUnavailable(format!(
                "no profitability figures for {}",
                facts.ticker
            )));
        }

        Ok(Evidence::new(
            json!({
                "period": latest.label,
                "gross_margin": gross_margin,
                "operating_margin": operating_margin,
                "net_margin": net_margin,
                "return_on_equity": return_on_equity,
            }),
            known as f64 / 4.0,
        ))
    }
}
