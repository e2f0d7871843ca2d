//! Error types for the CRPT API client.

use std::time::Duration;
use thiserror::Error;

/// Main error type for CRPT API operations.
#[derive(Error, Debug)]
pub enum CrptError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The document could not be rendered to JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Network or I/O failure while talking to the API
    #[error("Transport error: {0}")]
    Transport(String),

    /// The rate limiter was closed while waiting for (or before requesting) a permit
    #[error("Rate limiter is closed")]
    LimiterClosed,

    /// No permit became available within the allotted time
    #[error("Timed out after {0:?} waiting for a rate limit permit")]
    AcquireTimeout(Duration),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for CRPT API operations.
pub type Result<T> = std::result::Result<T, CrptError>;
