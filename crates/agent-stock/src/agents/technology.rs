//! Technology and intellectual property

use super::{DimensionAnalyzer, Evidence, percent};
use crate::dimension::Dimension;
use agent_core::{CollaboratorError, FinancialFacts};
use async_trait::async_trait;
use serde_json::json;

const TEMPLATE: &str = r"Evaluate the technology position and intellectual property of {{ company }} ({{ ticker }}){% if metrics.sector %} in the {{ metrics.sector }} sector{% endif %}.
{% if snippets %}
Reference knowledge:
{% for s in snippets %}- {{ s }}
{% endfor %}{% endif %}
R&D intensity: {{ metrics.rd_intensity | pct }}
Patents: {% if metrics.patent_count is none %}unknown{% else %}{{ metrics.patent_count }}{% endif %}

Weigh competitive advantage, innovation pipeline and technology risks. Score from 0 (lagging) to 10 (leading).";

#[derive(Debug, Clone, Copy, Default)]
pub struct TechnologyAnalyzer;

#[async_trait]
impl DimensionAnalyzer for TechnologyAnalyzer {
    fn dimension(&self) -> Dimension {
        Dimension::Technology
    }

    fn template(&self) -> &'static str {
        TEMPLATE
    }

    async fn collect(&self, facts: &FinancialFacts) -> Result<Evidence, CollaboratorError> {
        let rd_intensity = facts
            .latest()
            .and_then(|p| percent(p.research_and_development, p.revenue));

        if rd_intensity.is_none() && facts.patent_count.is_none() {
            return Err(CollaboratorError::DataUnavailable(format!(
                "no R&D or patent data for {}",
                facts.ticker
            )));
        }

        let confidence = match (rd_intensity, facts.patent_count) {
            (Some(_), Some(_)) => 1.0,
            _ => 0.7,
        };

        Ok(Evidence::new(
            json!({
                "sector": facts.sector,
                "rd_intensity": rd_intensity,
                "patent_count": facts.patent_count,
            }),
            confidence,
        ))
    }
}
