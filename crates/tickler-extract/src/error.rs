//! Error types for due-date extraction providers.

use std::time::Duration;

use thiserror::Error;

/// Errors a single extraction provider can report.
///
/// None of these escape [`crate::ExtractionCascade::extract`]; they are
/// logged and the cascade moves on to the next tier.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The completion service answered with a non-success status.
    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// The provider did not answer within the cascade's time budget.
    #[error("Provider timed out after {0:?}")]
    Timeout(Duration),

    /// The response did not have the expected structure.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
