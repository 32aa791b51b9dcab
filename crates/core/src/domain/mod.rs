// Domain Layer - Pure business logic and entities

pub mod command;
pub mod error;
pub mod queue;

// Re-exports
pub use command::{CommandId, CommandResult, CommandStatus, QueuedCommand};
pub use error::DomainError;
pub use queue::{CommandQueue, QueueId, DEFAULT_PAUSE_BETWEEN_SECS};
