// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid command state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Cursor cannot advance past the end of queue {queue_id} ({len} commands)")]
    CursorOutOfRange { queue_id: String, len: usize },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
