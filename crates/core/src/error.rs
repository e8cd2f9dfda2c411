// Central Error Type for the Application

use crate::domain::QueueCategory;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Submission carries neither an explicit group nor enough payload to derive one
    #[error("groupId is required for queue \"{category}\": provide it in options or ensure the payload has instanceId (and optionally customerId)")]
    MissingGroupId { category: QueueCategory },

    #[error("Unknown queue category: {0}")]
    UnknownCategory(String),

    #[error("Handler for queue \"{category}\" could not be constructed: {reason}")]
    HandlerConstruction {
        category: QueueCategory,
        reason: String,
    },

    #[error("Handler processing failed: {0}")]
    HandlerProcessing(String),

    /// Grouped queue backend unreachable or rejected the operation
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Errors raised while accepting a submission (nothing was enqueued)
    pub fn is_submission_error(&self) -> bool {
        matches!(
            self,
            AppError::MissingGroupId { .. } | AppError::UnknownCategory(_) | AppError::Validation(_)
        )
    }
}

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// (BrokerUnavailable for the queue, Database for the audit store)
