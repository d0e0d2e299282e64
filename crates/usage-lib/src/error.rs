//! Error types for metric fetching

use thiserror::Error;

/// Failure reported by a [`MetricFetcher`](crate::fetch::MetricFetcher)
///
/// Fetch errors are surfaced verbatim as the coordinator's combined error,
/// so the display strings are written for operators.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to metrics backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("metrics backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("query failed ({error_type}): {message}")]
    Query { error_type: String, message: String },

    #[error("failed to decode query response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid metrics backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
