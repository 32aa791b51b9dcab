// Queue admin requests and their validation

use serde::{Deserialize, Serialize};

use crate::application::constants::{MAX_COMMAND_LEN, MAX_PAUSE_BETWEEN_SECS, MAX_QUEUE_NAME_LEN};
use crate::error::{AppError, Result};

/// One command to append
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommand {
    pub command: String,
    pub description: String,
}

impl NewCommand {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}

/// Create-queue request
///
/// `name` defaults to `Queue_<id>`; `pause_between` to two seconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateQueueRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub commands: Vec<NewCommand>,
    #[serde(default)]
    pub auto_execute: bool,
    #[serde(default)]
    pub pause_between: Option<u64>,
}

pub(crate) fn validate_request(req: &CreateQueueRequest) -> Result<()> {
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("queue name cannot be empty".to_string()));
        }
        if name.chars().count() > MAX_QUEUE_NAME_LEN {
            return Err(AppError::Validation(format!(
                "queue name too long (max {} characters)",
                MAX_QUEUE_NAME_LEN
            )));
        }
    }

    if let Some(pause) = req.pause_between {
        if pause > MAX_PAUSE_BETWEEN_SECS {
            return Err(AppError::Validation(format!(
                "pause_between out of range (max {} seconds)",
                MAX_PAUSE_BETWEEN_SECS
            )));
        }
    }

    validate_commands(&req.commands)
}

pub(crate) fn validate_commands(commands: &[NewCommand]) -> Result<()> {
    for (i, cmd) in commands.iter().enumerate() {
        if cmd.command.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "command {} is empty",
                i + 1
            )));
        }
        if cmd.command.len() > MAX_COMMAND_LEN {
            return Err(AppError::Validation(format!(
                "command {} too long (max {} bytes)",
                i + 1,
                MAX_COMMAND_LEN
            )));
        }
        if cmd.description.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "description of command {} is empty",
                i + 1
            )));
        }
    }
    Ok(())
}
