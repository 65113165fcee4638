//! Executive leadership

use super::{DimensionAnalyzer, Evidence};
use crate::dimension::Dimension;
use agent_core::{CollaboratorError, FinancialFacts};
use async_trait::async_trait;
use serde_json::json;

const TEMPLATE: &str = r"Assess the leadership of {{ company }} ({{ ticker }}) under CEO {{ metrics.ceo_name }}.
{% if snippets %}
Reference knowledge:
{% for s in snippets %}- {{ s }}
{% endfor %}{% endif %}{% if metrics.business_summary %}
Business summary: {{ metrics.business_summary }}
{% endif %}
Consider track record, strategic vision and ability to execute. Score from 0 (poor) to 10 (outstanding).";

#[derive(Debug, Clone, Copy, Default)]
pub struct LeadershipAnalyzer;

#[async_trait]
impl DimensionAnalyzer for LeadershipAnalyzer {
    fn dimension(&self) -> Dimension {
        Dimension::Leadership
    }

    fn template(&self) -> &'static str {
        TEMPLATE
    }

    async fn collect(&self, facts: &FinancialFacts) -> Result<Evidence, CollaboratorError> {
        let ceo_name = facts
            .ceo_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                CollaboratorError::DataUnavailable(format!(
                    "CEO information not available for {}",
                    facts.ticker
                ))
            })?;

        let confidence = if facts.business_summary.is_some() { 1.0 } else { 0.7 };

        Ok(Evidence::new(
            json!({
                "ceo_name": ceo_name,
                "business_summary": facts.business_summary,
            }),
            confidence,
        ))
    }
}
