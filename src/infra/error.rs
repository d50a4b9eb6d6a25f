//! Error types for the external adapters and the sync loop

use thiserror::Error;

/// Order source failures (transport, API status, payload)
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid base URL: {0}")]
    BaseUrl(String),
}

/// Transaction store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown store: {0}")]
    UnknownStore(String),
}

/// Report channel failures
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures that abandon one store's batch
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid watermark {value:?}: {source}")]
    Watermark {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
