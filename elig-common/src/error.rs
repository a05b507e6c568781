//! Common error types for the eligibility warehouse

use thiserror::Error;

/// Common result type for warehouse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by every pipeline stage
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

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A required warehouse table is missing after provisioning
    #[error("Schema integrity error: {0}")]
    SchemaIntegrity(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
