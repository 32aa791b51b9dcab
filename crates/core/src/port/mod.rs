// Port Layer - Interfaces for external dependencies

pub mod command_executor;
pub mod id_provider; // For deterministic testing
pub mod queue_store;
pub mod run_lock;
pub mod time_provider;

// Re-exports
pub use command_executor::{CommandExecutor, ExecutionError, ExecutionOutput};
pub use id_provider::IdProvider;
pub use queue_store::QueueStore;
pub use run_lock::{ProcessRunLock, RunGuard, RunLock};
pub use time_provider::TimeProvider;
