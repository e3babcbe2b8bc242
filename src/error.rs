//! Error Module
//!
//! Defines the error and result types used throughout the large object
//! middleware.

use thiserror::Error;

/// Main error type for the middleware
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Segment error: {0}")]
    SegmentError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ProxyError {
    fn from(err: serde_yaml::Error) -> Self {
        ProxyError::SerializationError(err.to_string())
    }
}

impl From<hyper::header::InvalidHeaderValue> for ProxyError {
    fn from(err: hyper::header::InvalidHeaderValue) -> Self {
        ProxyError::HttpError(err.to_string())
    }
}

/// Result type alias for the middleware
pub type Result<T> = std::result::Result<T, ProxyError>;
