use std::time::Duration;

use thiserror::Error;

/// Application-wide error types for fanfetch.
#[derive(Error, Debug)]
pub enum AppError {
    /// The request was rejected before any fetch started.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Building the request or reading the response body failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A single fetch exceeded its per-request deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Fetching one URL of a batch failed. The first one aborts the batch.
    #[error("couldn't fetch {url:?}: {source}")]
    FetchError {
        url: String,
        #[source]
        source: Box<AppError>,
    },

    /// The caller-supplied batch deadline elapsed.
    #[error("Batch deadline exceeded after {0:?}")]
    BatchTimeout(Duration),

    /// The caller abandoned the batch.
    #[error("Batch cancelled")]
    Cancelled,

    /// Too many requests in flight.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// A worker task panicked or could not be joined.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap a fetch failure with the URL that caused it.
    pub fn fetch(url: impl Into<String>, source: AppError) -> Self {
        AppError::FetchError {
            url: url.into(),
            source: Box::new(source),
        }
    }

    /// Returns true if a deadline (per-request or per-batch) caused this error.
    pub fn is_deadline_exceeded(&self) -> bool {
        match self {
            AppError::Timeout(_) | AppError::BatchTimeout(_) => true,
            AppError::FetchError { source, .. } => source.is_deadline_exceeded(),
            _ => false,
        }
    }

    /// The URL whose fetch failed, if this is a fetch error.
    pub fn failed_url(&self) -> Option<&str> {
        match self {
            AppError::FetchError { url, .. } => Some(url),
            _ => None,
        }
    }
}
