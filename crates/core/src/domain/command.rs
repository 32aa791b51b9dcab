// Queued Command Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};

/// Command ID (`{queue_id}_{position}`)
pub type CommandId = String;

/// Command lifecycle state
///
/// `Pending -> Running -> {Completed, Failed}`, `Failed -> Skipped`,
/// `Pending -> Cancelled`. Completed, Skipped and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl CommandStatus {
    /// No transition leaves a terminal state
    pub fn is_terminal(self) -> bool {
        match self {
            CommandStatus::Completed | CommandStatus::Skipped | CommandStatus::Cancelled => true,
            CommandStatus::Pending | CommandStatus::Running | CommandStatus::Failed => false,
        }
    }

    pub fn can_transition_to(self, next: CommandStatus) -> bool {
        use CommandStatus::*;
        match (self, next) {
            (Pending, Running) | (Pending, Cancelled) => true,
            (Running, Completed) | (Running, Failed) => true,
            (Failed, Skipped) => true,
            (Pending, _) | (Running, _) | (Failed, _) => false,
            (Completed, _) | (Skipped, _) | (Cancelled, _) => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Running => "running",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
            CommandStatus::Skipped => "skipped",
            CommandStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommandStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(CommandStatus::Pending),
            "running" => Ok(CommandStatus::Running),
            "completed" => Ok(CommandStatus::Completed),
            "failed" => Ok(CommandStatus::Failed),
            "skipped" => Ok(CommandStatus::Skipped),
            "cancelled" => Ok(CommandStatus::Cancelled),
            other => Err(DomainError::ValidationError(format!(
                "unknown command status '{}'",
                other
            ))),
        }
    }
}

/// Captured process output of an executed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// A single shell command and its execution lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedCommand {
    pub id: CommandId,
    pub command: String,
    pub description: String,
    pub status: CommandStatus,
    pub result: Option<CommandResult>,
    pub error: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl QueuedCommand {
    /// Create a new Pending command
    pub fn new(
        id: impl Into<String>,
        command: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            description: description.into(),
            status: CommandStatus::Pending,
            result: None,
            error: None,
            start_time: None,
            end_time: None,
        }
    }

    fn transition(&mut self, next: CommandStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Pending -> Running, stamps `start_time`
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(CommandStatus::Running)?;
        self.start_time = Some(now);
        Ok(())
    }

    /// Running -> Completed, stamps `end_time`
    pub fn complete(&mut self, result: CommandResult, now: DateTime<Utc>) -> Result<()> {
        self.transition(CommandStatus::Completed)?;
        self.result = Some(result);
        self.end_time = Some(now);
        Ok(())
    }

    /// Running -> Failed, stamps `end_time`
    ///
    /// `result` is present when the executor ran the command and reported a
    /// non-success exit; it is `None` for transport errors.
    pub fn fail(
        &mut self,
        error: impl Into<String>,
        result: Option<CommandResult>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.transition(CommandStatus::Failed)?;
        self.error = Some(error.into());
        self.result = result;
        self.end_time = Some(now);
        Ok(())
    }

    /// Failed -> Skipped
    pub fn skip(&mut self) -> Result<()> {
        self.transition(CommandStatus::Skipped)
    }

    /// Pending -> Cancelled
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(CommandStatus::Cancelled)
    }

    /// Wall-clock duration of a finished run
    pub fn duration_secs(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }
}
