//! Error types for the upload client

use thiserror::Error;

/// Result type for client calls
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error type for the upload client
#[derive(Error, Debug)]
pub enum ClientError {
    /// Metadata or client settings are incomplete
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The service answered with a status other than 200
    #[error("Upload rejected with status {status}: {message}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// The request could not be sent
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Reading the dataset failed
    #[error("Core error: {0}")]
    Core(#[from] datalab_core::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
