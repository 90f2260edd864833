//! Error types for remote catalog and storage access.

use thiserror::Error;

/// Errors produced by the cloud layer.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;
