//! Error types for Beltline

use thiserror::Error;

/// Beltline error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Model shape the toy machinery cannot generate from
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
