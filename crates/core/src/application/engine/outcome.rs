// Structured results of engine operations

use serde::Serialize;

use crate::domain::{QueueId, QueuedCommand};

/// Result of one `execute_next` call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Nothing left to run (no-op)
    Idle,
    /// A Failed command awaits `skip`; nothing was executed
    Blocked {
        position: usize,
        command: QueuedCommand,
    },
    /// The command ran and succeeded; the cursor advanced
    Completed {
        position: usize,
        total: usize,
        command: QueuedCommand,
        next: Option<QueuedCommand>,
    },
    /// The command failed or the executor errored; the queue halts here
    Failed {
        position: usize,
        total: usize,
        command: QueuedCommand,
    },
}

impl StepOutcome {
    /// True when a command was handed to the executor
    pub fn executed(&self) -> bool {
        matches!(self, StepOutcome::Completed { .. } | StepOutcome::Failed { .. })
    }

    /// True when the queue cannot make progress without `skip` or `cancel`
    pub fn halts(&self) -> bool {
        matches!(self, StepOutcome::Blocked { .. } | StepOutcome::Failed { .. })
    }
}

/// Steps performed by one `execute_all` run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub queue_id: QueueId,
    pub steps: Vec<StepOutcome>,
    pub halted: bool,
}

impl BatchReport {
    pub fn executed(&self) -> usize {
        self.steps.iter().filter(|step| step.executed()).count()
    }
}

/// Result of `execute_all`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecuteAllOutcome {
    /// The queue is not `auto_execute` and `force` was not given;
    /// use `execute_next` for controlled execution
    RequiresConfirmation { queue_id: QueueId },
    Ran(BatchReport),
}
