// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
///
/// Only the synchronous failures a caller can observe live here. Failures that
/// happen inside a running scan are captured as the job's terminal result
/// (see [`crate::port::ScanFailure`]) and never surface through this type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown scanner tool: {0}")]
    UnknownTool(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Database(String)
