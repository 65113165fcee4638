//! Error types for ticker analysis operations

use agent_core::CollaboratorError;
use agent_utils::ConfigError;
use agent_workflow::WorkflowError;
use thiserror::Error;

/// Ticker analysis specific errors
#[derive(Debug, Error)]
pub enum StockError {
    /// Malformed or unresolvable ticker; aborts the run
    #[error("Validation failed for {ticker}: {reason}")]
    Validation { ticker: String, reason: String },

    /// A collaborator could not supply data, after retries where applicable
    #[error("Data not available for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    /// Timeout or rate limit from a collaborator
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// Optional subsystem is absent
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading or writing the on-disk cache or knowledge file failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Prompt template rendering failed
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

impl StockError {
    /// Classify a collaborator failure for `ticker`
    pub fn from_collaborator(ticker: &str, err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::CapabilityUnavailable(msg) => Self::CapabilityUnavailable(msg),
            e if e.is_transient() => Self::TransientIo(e.to_string()),
            e => Self::DataUnavailable {
                ticker: ticker.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

/// Result type alias for ticker analysis operations
pub type Result<T> = std::result::Result<T, StockError>;

impl From<ConfigError> for StockError {
    fn from(err: ConfigError) -> Self {
        StockError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = StockError::Validation {
            ticker: "BADTICKER".to_string(),
            reason: "malformed ticker".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Validation failed for BADTICKER: malformed ticker"
        );

        let err = StockError::DataUnavailable {
            ticker: "AAPL".to_string(),
            reason: "No data found".to_string(),
        };
        assert_eq!(err.to_string(), "Data not available for AAPL: No data found");
    }

    #[test]
    fn test_collaborator_classification() {
        let err = StockError::from_collaborator(
            "AAPL",
            CollaboratorError::Timeout(Duration::from_secs(1)),
        );
        assert!(matches!(err, StockError::TransientIo(_)));

        let err = StockError::from_collaborator(
            "AAPL",
            CollaboratorError::DataUnavailable("no statements".into()),
        );
        assert!(matches!(err, StockError::DataUnavailable { .. }));

        let err = StockError::from_collaborator(
            "AAPL",
            CollaboratorError::CapabilityUnavailable("embedding".into()),
        );
        assert!(matches!(err, StockError::CapabilityUnavailable(_)));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: StockError = ConfigError::Invalid {
            key: "TICKER_MAX_RETRIES".into(),
            value: "many".into(),
            reason: "invalid digit".into(),
        }
        .into();
        assert!(err.to_string().contains("TICKER_MAX_RETRIES"));
    }
}
