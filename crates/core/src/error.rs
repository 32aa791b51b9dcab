// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
///
/// Variants fall into two families:
/// - validation: `Validation`, `InvalidQueueId`, `NotFound`, `Conflict`, `InvalidState`, `Domain`
/// - storage: `Storage`, `Serialization`
///
/// Executor failures are recorded on the command, never returned as `AppError`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid queue id: {0:?}")]
    InvalidQueueId(String),

    #[error("Queue not found: {0}")]
    NotFound(String),

    #[error("Queue already exists: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Nothing to skip in queue: {0}")]
    NothingToSkip(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for callers
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Domain(_) => "INVALID_TRANSITION",
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::InvalidQueueId(_) => "INVALID_QUEUE_ID",
            AppError::NotFound(_) => "QUEUE_NOT_FOUND",
            AppError::Conflict(_) => "QUEUE_ALREADY_EXISTS",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::NothingToSkip(_) => "NOTHING_TO_SKIP",
            AppError::Storage(_) => "STORAGE_SAVE_FAILED",
            AppError::Serialization(_) => "SERIALIZATION_FAILED",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    /// True for failures of the durable flush (the caller's change was rolled back)
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            AppError::Storage(_) | AppError::Serialization(_)
        )
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
