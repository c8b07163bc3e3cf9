//! Error types for the search library.

use thiserror::Error;

use crate::transport::FetchFailure;

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during search operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Outbound request failed (DNS, connect, timeout, non-success status).
    #[error("Fetch failed: {0}")]
    Fetch(FetchFailure),

    /// Provider answered with a bot-challenge page.
    #[error("Provider '{0}' returned a challenge page")]
    Challenge(String),

    /// The requested provider is disabled.
    #[error("Provider '{0}' is disabled")]
    ProviderDisabled(String),

    /// No provider is registered under this id.
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    /// The operation was aborted through the cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid configuration or registry mutation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Filesystem or process I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl SearchError {
    /// Returns true when this error is the cancellation abort.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchError::Cancelled | SearchError::Fetch(FetchFailure::Cancelled))
    }
}

impl From<FetchFailure> for SearchError {
    fn from(cause: FetchFailure) -> Self {
        match cause {
            FetchFailure::Cancelled => SearchError::Cancelled,
            other => SearchError::Fetch(other),
        }
    }
}
