use serde::Serialize;
use thiserror::Error;

/// Result type for batcher operations.
pub type Result<T> = std::result::Result<T, BatcherError>;

/// Errors that can occur while planning or executing batch metric queries.
#[derive(Debug, Error)]
pub enum BatcherError {
    /// The metrics endpoint answered with a retryable status (5xx or 429)
    #[error("Downstream error: status {status}: {message}")]
    Downstream { status: u16, message: String },

    /// Client-side failure: non-retryable 4xx, bad URL, undecodable body
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// HTTP transport failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Batch URL could not be built
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The caller canceled the request before the batch call finished
    #[error("Request canceled: {0}")]
    Canceled(String),

    /// Anything else, with its context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Which side of the wire an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    /// The remote service or the network; the caller may retry.
    Downstream,
    /// This crate or the query it was given; retrying will not help.
    Plugin,
}

impl BatcherError {
    /// Classify an error as downstream or plugin.
    pub fn source_kind(&self) -> ErrorSource {
        match self {
            BatcherError::Downstream { .. } | BatcherError::Http(_) | BatcherError::Canceled(_) => {
                ErrorSource::Downstream
            }
            BatcherError::Plugin(_)
            | BatcherError::Json(_)
            | BatcherError::Url(_)
            | BatcherError::Other(_) => ErrorSource::Plugin,
        }
    }

    /// Build the error for a non-2xx response from the batch endpoint.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = if body.is_empty() {
            "empty response body".to_string()
        } else {
            body.to_string()
        };
        if status >= 500 || status == 429 {
            BatcherError::Downstream { status, message }
        } else {
            BatcherError::Plugin(format!("request failed, status: {status}, body: {message}"))
        }
    }
}

/// A per-query error.
///
/// Unlike [`BatcherError`] this is cloneable, so a single group-level failure can be
/// reported against every query in the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct QueryError {
    pub kind: ErrorSource,
    pub message: String,
}

impl QueryError {
    pub fn downstream(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorSource::Downstream,
            message: message.into(),
        }
    }

    pub fn plugin(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorSource::Plugin,
            message: message.into(),
        }
    }
}

impl From<&BatcherError> for QueryError {
    fn from(err: &BatcherError) -> Self {
        Self {
            kind: err.source_kind(),
            message: err.to_string(),
        }
    }
}
