//! Basic ticker analysis example
//!
//! Runs the full workflow against in-memory collaborators, so no API keys
//! are needed. Swap the providers for real market-data and LLM clients to
//! analyze live tickers.
//!
//! To run this example:
//! ```bash
//! RUST_LOG=debug cargo run --example basic_analysis ACME
//! ```

use agent_core::{
    CollaboratorError, DocumentSource, FinancialDataProvider, FinancialFacts, FinancialPeriod,
    PromptContext, Reasoning, ReasoningProvider, Result as CollaboratorResult, SentimentDocument,
    SentimentProvider,
};
use agent_stock::{AnalysisOptions, AnalyzerConfig, TickerAnalyzer};
use async_trait::async_trait;
use std::env;
use std::sync::Arc;

struct SampleFinancials;

#[async_trait]
impl FinancialDataProvider for SampleFinancials {
    async fn fetch(&self, ticker: &str) -> CollaboratorResult<FinancialFacts> {
        if ticker.starts_with('X') {
            return Err(CollaboratorError::DataUnavailable(format!("{ticker} is not listed")));
        }

        Ok(FinancialFacts {
            company_name: Some(format!("{ticker} Holdings")),
            sector: Some("Technology".into()),
            industry: Some("Software".into()),
            ceo_name: Some("Alex Morgan".into()),
            business_summary: Some("Enterprise software and cloud services".into()),
            return_on_equity: Some(0.28),
            patent_count: Some(340),
            periods: vec![
                FinancialPeriod {
                    label: "2024".into(),
                    revenue: Some(1_200.0),
                    research_and_development: Some(210.0),
                    gross_profit: Some(840.0),
                    operating_income: Some(360.0),
                    net_income: Some(270.0),
                },
                FinancialPeriod {
                    label: "2023".into(),
                    revenue: Some(1_000.0),
                    research_and_development: Some(170.0),
                    gross_profit: Some(680.0),
                    operating_income: Some(280.0),
                    net_income: Some(200.0),
                },
            ],
            ..FinancialFacts::new(ticker)
        })
    }
}

struct SampleHeadlines;

#[async_trait]
impl SentimentProvider for SampleHeadlines {
    async fn fetch(&self, _ticker: &str) -> CollaboratorResult<Vec<SentimentDocument>> {
        Ok(vec![
            SentimentDocument::scored(DocumentSource::News, "Record quarter on cloud demand", 0.6),
            SentimentDocument::scored(DocumentSource::News, "Analysts raise targets", 0.4),
            SentimentDocument::scored(DocumentSource::Social, "", 0.1),
        ])
    }
}

/// Scores each dimension from a fixed table
struct RuleOfThumb;

#[async_trait]
impl ReasoningProvider for RuleOfThumb {
    async fn generate(&self, _prompt: &str, context: &PromptContext) -> CollaboratorResult<Reasoning> {
        let score = match context.dimension() {
            Some("cash_flow") => 8.0,
            Some("profit") => 7.5,
            Some("leadership") => 6.5,
            Some("technology") => 8.5,
            _ => 6.0,
        };
        let narrative = format!(
            "{} looks solid on {} ({} reference notes)",
            context.company().unwrap_or("The company"),
            context.dimension().unwrap_or("this dimension"),
            context.snippets().len()
        );
        Ok(Reasoning::new(narrative, score).with_confidence(0.8))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    agent_utils::init_tracing();

    let ticker = env::args().nth(1).unwrap_or_else(|| "ACME".to_string());

    let analyzer = TickerAnalyzer::builder()
        .config(AnalyzerConfig::builder().with_env()?.build()?)
        .financial_data(Arc::new(SampleFinancials))
        .sentiment(Arc::new(SampleHeadlines))
        .reasoner("rule-of-thumb", Arc::new(RuleOfThumb))
        .build()
        .await?;

    println!("Retrieval: {:?}", analyzer.retrieval_strategy());
    println!("Execution: {:?}\n", analyzer.execution_mode());

    let run = analyzer
        .run_analysis(&ticker, AnalysisOptions::default())
        .await?;

    for record in run.state.scores() {
        println!("{:<12} {:>5.2}", record.dimension.label(), record.value);
    }

    if let Some(rec) = &run.recommendation {
        println!("\n{} ({:.2}/10, confidence {})", rec.tier(), rec.weighted_score(), rec.confidence_label);
        println!("{}", rec.rationale);
    }

    for entry in &run.state.errors {
        println!("[{:?}] {}: {}", entry.severity, entry.node, entry.message);
    }

    Ok(())
}
