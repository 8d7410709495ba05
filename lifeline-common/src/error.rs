//! Common error types for Lifeline

use thiserror::Error;

/// Common result type for Lifeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Lifeline crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading callers or calls from the backend failed
    ///
    /// Scoped to the view that issued the read; the previous snapshot or an
    /// explicit error status stays in place.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// A newer request replaced this one before it completed
    #[error("Superseded: {0}")]
    Superseded(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
