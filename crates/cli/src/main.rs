//! cmdqueue - persistent, resumable command queues from the terminal

mod app;
mod config;
mod render;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use cmdqueue_core::application::{CreateQueueRequest, ExecuteAllOutcome, NewCommand, StepOutcome};

use crate::app::App;
use crate::config::Settings;

#[derive(Parser)]
#[command(name = "cmdqueue")]
#[command(about = "Persistent, resumable command queues", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ~/.cmdqueue/config.toml)
    #[arg(long, global = true, env = "CMDQUEUE_CONFIG")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Args)]
struct CommandArgs {
    /// Shell command to queue (repeatable, run in the given order)
    #[arg(short = 'c', long = "cmd")]
    commands: Vec<String>,

    /// Description for the command at the same position (defaults to the command)
    #[arg(short = 'd', long = "desc")]
    descriptions: Vec<String>,

    /// JSON file with `[{"command": ..., "description": ...}]`
    #[arg(long)]
    file: Option<PathBuf>,
}

impl CommandArgs {
    fn into_commands(self) -> Result<Vec<NewCommand>> {
        if self.descriptions.len() > self.commands.len() {
            anyhow::bail!(
                "{} descriptions given for {} commands",
                self.descriptions.len(),
                self.commands.len()
            );
        }

        let mut descriptions = self.descriptions.into_iter();
        let mut commands: Vec<NewCommand> = self
            .commands
            .into_iter()
            .map(|command| {
                let description = descriptions.next().unwrap_or_else(|| command.clone());
                NewCommand::new(command, description)
            })
            .collect();

        if let Some(path) = self.file {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let from_file: Vec<NewCommand> = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid command list in {}", path.display()))?;
            commands.extend(from_file);
        }

        Ok(commands)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new queue
    Create {
        /// Human-readable name (default: Queue_<id>)
        #[arg(short, long)]
        name: Option<String>,

        /// Allow `run` without --force
        #[arg(long)]
        auto: bool,

        /// Seconds to wait between commands during `run` (default: 2)
        #[arg(long)]
        pause: Option<u64>,

        #[command(flatten)]
        commands: CommandArgs,
    },

    /// Append commands to a queue
    Add {
        /// Queue ID
        queue_id: String,

        #[command(flatten)]
        commands: CommandArgs,
    },

    /// Run the next pending command
    Next {
        /// Queue ID
        queue_id: String,
    },

    /// Run commands until the queue finishes or a command fails
    Run {
        /// Queue ID
        queue_id: String,

        /// Run even if the queue is not set to auto-execute
        #[arg(long)]
        force: bool,
    },

    /// Show one queue, or a summary of all queues
    Status {
        /// Queue ID
        queue_id: Option<String>,
    },

    /// Skip the failed command blocking a queue
    Skip {
        /// Queue ID
        queue_id: String,
    },

    /// Cancel all pending commands of a queue
    Cancel {
        /// Queue ID
        queue_id: String,
    },

    /// Delete a queue
    Delete {
        /// Queue ID
        queue_id: String,
    },
}

impl Commands {
    /// Whether the command may write to the store
    fn mutates(&self) -> bool {
        !matches!(self, Commands::Status { .. })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 1. Configuration and logging
    let settings = Settings::load(cli.config.as_deref())?;
    let _log_guard = telemetry::init(&settings)?;
    debug!(version = cmdqueue_core::VERSION, "cmdqueue starting");

    // 2. Wiring, then crash recovery before anything writes
    let app = App::build(&settings).await?;
    if cli.command.mutates() {
        app.recover().await;
    }

    // 3. Dispatch
    dispatch(&app, cli.command, cli.json).await
}

async fn dispatch(app: &App, command: Commands, as_json: bool) -> Result<ExitCode> {
    match command {
        Commands::Create {
            name,
            auto,
            pause,
            commands,
        } => {
            let request = CreateQueueRequest {
                name,
                commands: commands.into_commands()?,
                auto_execute: auto,
                pause_between: pause,
            };
            let queue = app.admin.create_queue(request).await?;
            if as_json {
                render::json(&queue)?;
            } else {
                render::created(&queue);
            }
        }

        Commands::Add { queue_id, commands } => {
            let added = app
                .admin
                .add_commands(&queue_id, commands.into_commands()?)
                .await?;
            if as_json {
                render::json(&added)?;
            } else {
                render::added(&queue_id, &added);
            }
        }

        Commands::Next { queue_id } => {
            let outcome = app.engine.execute_next(&queue_id).await?;
            if as_json {
                render::json(&outcome)?;
            } else {
                render::step(&queue_id, &outcome);
            }
            if matches!(outcome, StepOutcome::Failed { .. }) {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Run { queue_id, force } => {
            let outcome = app.engine.execute_all(&queue_id, force).await?;
            if as_json {
                render::json(&outcome)?;
            } else {
                render::execute_all(&outcome);
            }
            if matches!(&outcome, ExecuteAllOutcome::Ran(report) if report.halted) {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Status { queue_id } => {
            let report = app.engine.status(queue_id.as_ref()).await?;
            if as_json {
                render::json(&report)?;
            } else {
                render::status(&report);
            }
        }

        Commands::Skip { queue_id } => {
            let skipped = app.engine.skip(&queue_id).await?;
            if as_json {
                render::json(&skipped)?;
            } else {
                render::skipped(&queue_id, &skipped);
            }
        }

        Commands::Cancel { queue_id } => {
            let count = app.engine.cancel(&queue_id).await?;
            if as_json {
                render::json(&serde_json::json!({ "queue_id": queue_id, "cancelled": count }))?;
            } else {
                render::cancelled(&queue_id, count);
            }
        }

        Commands::Delete { queue_id } => {
            app.admin.delete_queue(&queue_id).await?;
            if as_json {
                render::json(&serde_json::json!({ "queue_id": queue_id, "deleted": true }))?;
            } else {
                render::deleted(&queue_id);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
