//! Error taxonomy shared by all collaborators

use std::time::Duration;
use thiserror::Error;

/// Result type alias for collaborator calls
pub type Result<T> = std::result::Result<T, CollaboratorError>;

/// Failure reported by an external collaborator
///
/// The engine only cares about one distinction: whether trying again could
/// help. [`CollaboratorError::is_transient`] answers that.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    /// Call did not complete within its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream rejected the call due to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Temporary I/O failure (connection reset, 5xx, ...)
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// Upstream data is missing or malformed; retrying will not help
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// An optional capability is not present
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),
}

impl CollaboratorError {
    /// Whether the failure is worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::RateLimited(_) | Self::TransientIo(_)
        )
    }
}
