// Read-only status projections

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{CommandQueue, CommandStatus, QueueId, QueuedCommand};

/// One command as shown to operators (position is 1-based)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandView {
    pub position: usize,
    pub id: String,
    pub description: String,
    pub command: String,
    pub status: CommandStatus,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub duration_secs: Option<f64>,
}

impl CommandView {
    fn new(position: usize, cmd: &QueuedCommand) -> Self {
        Self {
            position,
            id: cmd.id.clone(),
            description: cmd.description.clone(),
            command: cmd.command.clone(),
            status: cmd.status,
            exit_code: cmd.result.as_ref().map(|r| r.exit_code),
            error: cmd.error.clone(),
            duration_secs: cmd.duration_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatusView {
    pub id: QueueId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub current_index: usize,
    pub total: usize,
    pub completed: usize,
    pub auto_execute: bool,
    pub pause_between: u64,
    pub commands: Vec<CommandView>,
}

impl From<&CommandQueue> for QueueStatusView {
    fn from(queue: &CommandQueue) -> Self {
        Self {
            id: queue.id.clone(),
            name: queue.name.clone(),
            created_at: queue.created_at,
            current_index: queue.current_index,
            total: queue.len(),
            completed: queue.completed_count(),
            auto_execute: queue.auto_execute,
            pause_between: queue.pause_between,
            commands: queue
                .commands
                .iter()
                .enumerate()
                .map(|(i, cmd)| CommandView::new(i + 1, cmd))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSummary {
    pub id: QueueId,
    pub name: String,
    pub completed: usize,
    pub total: usize,
}

/// Progress across every known queue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStatus {
    pub queues: Vec<QueueSummary>,
    pub completed: usize,
    pub total: usize,
}

impl OverallStatus {
    pub fn from_queues(queues: &[CommandQueue]) -> Self {
        let summaries: Vec<QueueSummary> = queues
            .iter()
            .map(|q| QueueSummary {
                id: q.id.clone(),
                name: q.name.clone(),
                completed: q.completed_count(),
                total: q.len(),
            })
            .collect();

        Self {
            completed: summaries.iter().map(|s| s.completed).sum(),
            total: summaries.iter().map(|s| s.total).sum(),
            queues: summaries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum StatusReport {
    Queue(QueueStatusView),
    Overall(OverallStatus),
}
