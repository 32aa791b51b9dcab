// Command Queue Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::command::{CommandStatus, QueuedCommand};
use crate::domain::error::{DomainError, Result};

/// Queue identifier
pub type QueueId = String;

/// Default pause between successive commands in `execute_all`
pub const DEFAULT_PAUSE_BETWEEN_SECS: u64 = 2;

/// An ordered, named batch of commands with a progress cursor
///
/// Invariant: `0 <= current_index <= commands.len()`, never decreasing.
/// Commands are only ever appended; their order is execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandQueue {
    pub id: QueueId,
    pub name: String,
    pub commands: Vec<QueuedCommand>,
    pub current_index: usize,
    pub created_at: DateTime<Utc>,
    pub auto_execute: bool,
    pub pause_between: u64,
}

impl CommandQueue {
    /// Create an empty queue
    ///
    /// # Arguments
    ///
    /// * `id` - Unique queue ID (injected, not generated)
    /// * `name` - Human label
    /// * `created_at` - Creation time (injected, not system time)
    pub fn new(id: impl Into<String>, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            commands: Vec::new(),
            current_index: 0,
            created_at,
            auto_execute: false,
            pause_between: DEFAULT_PAUSE_BETWEEN_SECS,
        }
    }

    pub fn with_auto_execute(mut self, auto_execute: bool) -> Self {
        self.auto_execute = auto_execute;
        self
    }

    pub fn with_pause_between(mut self, seconds: u64) -> Self {
        self.pause_between = seconds;
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Append a Pending command at the tail
    ///
    /// Input is not validated here; callers reject empty text.
    pub fn add_command(
        &mut self,
        command: impl Into<String>,
        description: impl Into<String>,
    ) -> &QueuedCommand {
        let id = format!("{}_{}", self.id, self.commands.len());
        self.commands
            .push(QueuedCommand::new(id, command, description));
        &self.commands[self.commands.len() - 1]
    }

    /// Command under the cursor, `None` past the end
    pub fn get_current(&self) -> Option<&QueuedCommand> {
        self.commands.get(self.current_index)
    }

    /// Position of the next command that needs resolution
    ///
    /// The first non-terminal command at/after the cursor decides:
    /// Pending is runnable, Failed blocks until skipped, Running means a
    /// step is still in flight and nothing else is actionable.
    pub fn next_actionable_index(&self) -> Option<usize> {
        let (offset, cmd) = self
            .commands
            .iter()
            .enumerate()
            .skip(self.current_index)
            .find(|(_, cmd)| !cmd.status.is_terminal())?;

        match cmd.status {
            CommandStatus::Pending | CommandStatus::Failed => Some(offset),
            CommandStatus::Running => None,
            CommandStatus::Completed | CommandStatus::Skipped | CommandStatus::Cancelled => None,
        }
    }

    /// Next Pending command, or the Failed one awaiting `skip`
    ///
    /// Read-only; safe to call repeatedly.
    pub fn get_next_pending(&self) -> Option<&QueuedCommand> {
        self.next_actionable_index()
            .and_then(|index| self.commands.get(index))
    }

    pub fn command_mut(&mut self, index: usize) -> Option<&mut QueuedCommand> {
        self.commands.get_mut(index)
    }

    /// Move the cursor forward by one, then past already-resolved positions
    pub fn advance(&mut self) -> Result<()> {
        if self.current_index >= self.commands.len() {
            return Err(DomainError::CursorOutOfRange {
                queue_id: self.id.clone(),
                len: self.commands.len(),
            });
        }
        self.current_index += 1;
        while self
            .commands
            .get(self.current_index)
            .is_some_and(|cmd| cmd.status.is_terminal())
        {
            self.current_index += 1;
        }
        Ok(())
    }

    /// Skip the Failed command blocking the queue and advance
    ///
    /// Returns `Ok(None)` when nothing unresolved remains.
    pub fn skip_current(&mut self) -> Result<Option<&QueuedCommand>> {
        let Some(index) = self
            .commands
            .iter()
            .skip(self.current_index)
            .position(|cmd| !cmd.status.is_terminal())
            .map(|offset| offset + self.current_index)
        else {
            return Ok(None);
        };

        self.commands[index].skip()?;
        self.advance()?;
        Ok(self.commands.get(index))
    }

    /// Cancel every Pending command at/after the cursor
    ///
    /// Running and terminal commands are left alone. Returns the count.
    pub fn cancel_remaining(&mut self) -> usize {
        let start = self.current_index.min(self.commands.len());
        let mut cancelled = 0;
        for cmd in &mut self.commands[start..] {
            if cmd.status == CommandStatus::Pending && cmd.cancel().is_ok() {
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn completed_count(&self) -> usize {
        self.count_by_status(CommandStatus::Completed)
    }

    pub fn count_by_status(&self, status: CommandStatus) -> usize {
        self.commands
            .iter()
            .filter(|cmd| cmd.status == status)
            .count()
    }

    /// Cursor invariant check used when loading untrusted state
    pub fn cursor_in_bounds(&self) -> bool {
        self.current_index <= self.commands.len()
    }
}
