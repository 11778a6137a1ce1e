//! Common error types for MedScan
//!
//! Defines the shared error taxonomy using thiserror for clear error
//! propagation across the station components.

use thiserror::Error;

/// Common result type for MedScan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the MedScan station
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input (bad upload type, malformed request parameter)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Upload exceeds the configured size ceiling
    #[error("Payload too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Operation not permitted in the session's current phase
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Inference transport failure (connection refused, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Inference backend returned a non-success or malformed response
    #[error("Backend error: {0}")]
    Backend(String),

    /// Submitted record is missing a required field
    #[error("Validation error: {0}")]
    Validation(String),

    /// Attachment write or record insert failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
