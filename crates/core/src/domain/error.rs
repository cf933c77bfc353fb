// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid job status transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown scanner tool: {0}")]
    UnknownTool(String),

    #[error("Unknown job status: {0}")]
    UnknownStatus(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
