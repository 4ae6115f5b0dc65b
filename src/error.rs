//! Error types for the abusegate crate.

use thiserror::Error;

use crate::store::StoreError;

/// Main error type for gate operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// Configuration-related errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Administrative call rejected (missing, unset, or wrong secret)
    #[error("administrative call forbidden: {0}")]
    Forbidden(String),

    /// Counter store errors
    #[error("counter store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
