// Application Layer - Use Cases and Business Logic

pub mod admin;
pub mod constants;
pub mod engine;
pub mod locks;
pub mod recovery;
pub mod status;

// Re-exports
pub use admin::{CreateQueueRequest, NewCommand, QueueAdminService};
pub use engine::{BatchReport, ExecuteAllOutcome, QueueExecutionEngine, StepOutcome};
pub use locks::QueueLocks;
pub use recovery::RecoveryService;
pub use status::{CommandView, OverallStatus, QueueStatusView, QueueSummary, StatusReport};
