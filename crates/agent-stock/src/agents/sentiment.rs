//! News and social-media sentiment

use super::{DimensionAnalyzer, Evidence};
use crate::dimension::Dimension;
use agent_core::{
    CollaboratorError, DocumentSource, FinancialFacts, SentimentDocument, SentimentProvider,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const NEWS_WEIGHT: f64 = 0.6;
const SOCIAL_WEIGHT: f64 = 0.4;
const CATEGORY_THRESHOLD: f64 = 0.15;

const TEMPLATE: &str = r"Interpret market sentiment around {{ company }} ({{ ticker }}).
{% if snippets %}
Reference knowledge:
{% for s in snippets %}- {{ s }}
{% endfor %}{% endif %}
News polarity: {{ metrics.news_polarity | num }} over {{ metrics.news_count }} articles
Social polarity: {{ metrics.social_polarity | num }} over {{ metrics.social_count }} posts
Combined polarity: {{ metrics.combined_polarity | num }} ({{ metrics.category }})
{% if metrics.headlines %}
Recent headlines:
{% for h in metrics.headlines %}- {{ h }}
{% endfor %}{% endif %}
Polarity ranges from -1 to 1 and maps to {{ metrics.scaled_score | num }} on a 0-10 scale. Score from 0 (very negative) to 10 (very positive).";

/// Combined polarity and how much to trust it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentSummary {
    pub polarity: f64,
    pub confidence: f64,
}

/// Combine average news and social polarity, favouring news
pub fn combine(news: Option<f64>, social: Option<f64>) -> SentimentSummary {
    let (polarity, confidence) = match (news, social) {
        (Some(n), Some(s)) => (n * NEWS_WEIGHT + s * SOCIAL_WEIGHT, 0.9),
        (Some(n), None) => (n, 0.7),
        (None, Some(s)) => (s, 0.6),
        (None, None) => (0.0, 0.1),
    };
    SentimentSummary {
        polarity: polarity.clamp(-1.0, 1.0),
        confidence,
    }
}

/// Map polarity in [-1, 1] to [0, 10]
pub fn polarity_to_score(polarity: f64) -> f64 {
    (polarity.clamp(-1.0, 1.0) + 1.0) * 5.0
}

pub fn category(polarity: f64) -> &'static str {
    if polarity > CATEGORY_THRESHOLD {
        "positive"
    } else if polarity < -CATEGORY_THRESHOLD {
        "negative"
    } else {
        "neutral"
    }
}

fn average_polarity(docs: &[SentimentDocument], source: DocumentSource) -> (Option<f64>, usize) {
    let values: Vec<f64> = docs
        .iter()
        .filter(|d| d.source == source)
        .filter_map(|d| d.polarity)
        .filter(|p| p.is_finite())
        .collect();

    if values.is_empty() {
        return (None, 0);
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    (Some(avg), values.len())
}

pub struct SentimentAnalyzer {
    provider: Arc<dyn SentimentProvider>,
}

impl SentimentAnalyzer {
    pub fn new(provider: Arc<dyn SentimentProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl DimensionAnalyzer for SentimentAnalyzer {
    fn dimension(&self) -> Dimension {
        Dimension::Sentiment
    }

    fn template(&self) -> &'static str {
        TEMPLATE
    }

    async fn collect(&self, facts: &FinancialFacts) -> Result<Evidence, CollaboratorError> {
        let docs = self.provider.fetch(&facts.ticker).await?;

        let (news, news_count) = average_polarity(&docs, DocumentSource::News);
        let (social, social_count) = average_polarity(&docs, DocumentSource::Social);
        let summary = combine(news, social);

        let headlines: Vec<&str> = docs
            .iter()
            .filter(|d| d.source == DocumentSource::News && !d.title.is_empty())
            .map(|d| d.title.as_str())
            .take(5)
            .collect();

        Ok(Evidence::new(
            json!({
                "news_polarity": news,
                "news_count": news_count,
                "social_polarity": social,
                "social_count": social_count,
                "combined_polarity": summary.polarity,
                "category": category(summary.polarity),
                "scaled_score": polarity_to_score(summary.polarity),
                "headlines": headlines,
            }),
            summary.confidence,
        ))
    }
}
