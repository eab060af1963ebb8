//! Error types for ailint-core

use thiserror::Error;

/// Main error type for the ailint-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Remote store unreachable at construction time
    #[error("connection error: {0}")]
    Connection(String),

    /// A single already-connected remote operation failed
    #[error("storage operation error: {0}")]
    Operation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Record not found by id
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Result type alias for ailint-core
pub type Result<T> = std::result::Result<T, Error>;
