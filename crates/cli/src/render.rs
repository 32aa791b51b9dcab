//! Terminal output for command results

use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

use cmdqueue_core::application::{
    BatchReport, ExecuteAllOutcome, OverallStatus, QueueStatusView, StatusReport, StepOutcome,
};
use cmdqueue_core::domain::{CommandQueue, CommandStatus, QueuedCommand};

const MAX_CELL_CHARS: usize = 60;

#[derive(Tabled)]
struct CommandRow {
    #[tabled(rename = "#")]
    position: usize,
    status: String,
    description: String,
    command: String,
    exit: String,
    duration: String,
}

#[derive(Tabled)]
struct QueueRow {
    id: String,
    name: String,
    progress: String,
}

pub fn json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_CELL_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX_CELL_CHARS - 1).collect();
        format!("{}…", cut)
    }
}

fn status_icon(status: CommandStatus) -> String {
    match status {
        CommandStatus::Pending => "○ pending".to_string(),
        CommandStatus::Running => "▶ running".yellow().to_string(),
        CommandStatus::Completed => "✓ completed".green().to_string(),
        CommandStatus::Failed => "✗ failed".red().to_string(),
        CommandStatus::Skipped => "↷ skipped".dimmed().to_string(),
        CommandStatus::Cancelled => "⊘ cancelled".dimmed().to_string(),
    }
}

pub fn created(queue: &CommandQueue) {
    println!(
        "{}",
        format!("✓ Queue {} created", queue.id).green().bold()
    );
    println!("  {} {}", "Name:".bold(), queue.name);
    println!("  {} {}", "Commands:".bold(), queue.len());
    println!(
        "  {} {}",
        "Auto-execute:".bold(),
        if queue.auto_execute { "yes" } else { "no" }
    );
    println!("  {} {}s", "Pause between:".bold(), queue.pause_between);
}

pub fn added(queue_id: &str, commands: &[QueuedCommand]) {
    println!(
        "{}",
        format!("✓ Added {} command(s) to {}", commands.len(), queue_id)
            .green()
            .bold()
    );
    for cmd in commands {
        println!("  {} {} {}", "•".bold(), cmd.description, cmd.command.dimmed());
    }
}

fn command_result(command: &QueuedCommand) {
    if let Some(result) = &command.result {
        println!("  {} {}", "Exit code:".bold(), result.exit_code);
        if !result.stdout.trim().is_empty() {
            println!("  {}", "stdout:".bold());
            println!("{}", result.stdout.trim_end());
        }
        if !result.stderr.trim().is_empty() {
            println!("  {}", "stderr:".bold());
            println!("{}", result.stderr.trim_end().red());
        }
    }
    if let Some(error) = &command.error {
        println!("  {} {}", "Error:".bold(), error.red());
    }
}

pub fn step(queue_id: &str, outcome: &StepOutcome) {
    match outcome {
        StepOutcome::Idle => {
            println!("{}", format!("No pending commands in {}", queue_id).yellow());
        }
        StepOutcome::Blocked { position, command } => {
            println!(
                "{}",
                format!(
                    "Command {} ({}) failed; run `cmdqueue skip {}` to continue",
                    position, command.description, queue_id
                )
                .yellow()
            );
        }
        StepOutcome::Completed {
            position,
            total,
            command,
            next,
        } => {
            println!(
                "{}",
                format!("✓ [{}/{}] {}", position, total, command.description)
                    .green()
                    .bold()
            );
            command_result(command);
            if let Some(next) = next {
                println!("  {} {}", "Next:".bold(), next.description);
            }
        }
        StepOutcome::Failed {
            position,
            total,
            command,
        } => {
            println!(
                "{}",
                format!("✗ [{}/{}] {}", position, total, command.description)
                    .red()
                    .bold()
            );
            command_result(command);
        }
    }
}

pub fn execute_all(outcome: &ExecuteAllOutcome) {
    match outcome {
        ExecuteAllOutcome::RequiresConfirmation { queue_id } => {
            println!(
                "{}",
                format!("Queue {} is not set to auto-execute.", queue_id).yellow()
            );
            println!(
                "  Run `cmdqueue next {}` step by step, or `cmdqueue run {} --force`.",
                queue_id, queue_id
            );
        }
        ExecuteAllOutcome::Ran(report) => batch(report),
    }
}

fn batch(report: &BatchReport) {
    for outcome in &report.steps {
        step(&report.queue_id, outcome);
    }
    println!();
    if report.halted {
        println!(
            "{}",
            format!(
                "Queue {} halted after {} command(s)",
                report.queue_id,
                report.executed()
            )
            .red()
            .bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "✓ Queue {} finished ({} command(s) run)",
                report.queue_id,
                report.executed()
            )
            .green()
            .bold()
        );
    }
}

pub fn status(report: &StatusReport) {
    match report {
        StatusReport::Queue(view) => queue_status(view),
        StatusReport::Overall(overall) => overall_status(overall),
    }
}

fn queue_status(view: &QueueStatusView) {
    println!("{}", format!("Queue {} ({})", view.id, view.name).cyan().bold());
    println!(
        "  {} {}/{} completed",
        "Progress:".bold(),
        view.completed,
        view.total
    );
    println!(
        "  {} {}",
        "Created:".bold(),
        view.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    if view.commands.is_empty() {
        println!("  (no commands)");
        return;
    }

    let rows: Vec<CommandRow> = view
        .commands
        .iter()
        .map(|cmd| CommandRow {
            position: cmd.position,
            status: cmd.status.to_string(),
            description: truncate(&cmd.description),
            command: truncate(&cmd.command),
            exit: cmd.exit_code.map(|c| c.to_string()).unwrap_or_default(),
            duration: cmd
                .duration_secs
                .map(|d| format!("{:.1}s", d))
                .unwrap_or_default(),
        })
        .collect();
    println!("{}", Table::new(rows));

    for cmd in view.commands.iter().filter(|c| c.error.is_some()) {
        println!(
            "  {} #{} {}",
            status_icon(cmd.status),
            cmd.position,
            cmd.error.as_deref().unwrap_or_default()
        );
    }
}

fn overall_status(overall: &OverallStatus) {
    println!("{}", "Command Queues".cyan().bold());
    println!();

    if overall.queues.is_empty() {
        println!("  No queues yet. Create one with `cmdqueue create`.");
        return;
    }

    let rows: Vec<QueueRow> = overall
        .queues
        .iter()
        .map(|q| QueueRow {
            id: q.id.clone(),
            name: truncate(&q.name),
            progress: format!("{}/{}", q.completed, q.total),
        })
        .collect();
    println!("{}", Table::new(rows));
    println!();
    println!(
        "  {} {}/{} commands completed",
        "Total:".bold(),
        overall.completed,
        overall.total
    );
}

pub fn skipped(queue_id: &str, command: &QueuedCommand) {
    println!(
        "{}",
        format!("↷ Skipped {} in {}", command.description, queue_id).bold()
    );
}

pub fn cancelled(queue_id: &str, count: usize) {
    println!(
        "{}",
        format!("✓ Cancelled {} pending command(s) in {}", count, queue_id)
            .green()
            .bold()
    );
}

pub fn deleted(queue_id: &str) {
    println!("{}", format!("✓ Queue {} deleted", queue_id).green().bold());
}
