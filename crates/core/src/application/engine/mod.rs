// Queue Execution Engine - drives queues one command at a time

mod outcome;
mod panic_guard;

pub use outcome::{BatchReport, ExecuteAllOutcome, StepOutcome};
pub use panic_guard::run_isolated;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::application::locks::QueueLocks;
use crate::application::status::{OverallStatus, QueueStatusView, StatusReport};
use crate::domain::{CommandQueue, CommandStatus, QueueId, QueuedCommand};
use crate::error::{AppError, Result};
use crate::port::{CommandExecutor, ProcessRunLock, QueueStore, RunLock, TimeProvider};

/// Executes queued commands against a `CommandExecutor` and persists every
/// state change through the `QueueStore`
///
/// Each step holds the queue's lock for its whole load-run-persist cycle.
/// Executor errors and panics are recorded on the command as `Failed`; only
/// storage and validation problems surface as `Err`.
pub struct QueueExecutionEngine {
    store: Arc<dyn QueueStore>,
    executor: Arc<dyn CommandExecutor>,
    time_provider: Arc<dyn TimeProvider>,
    locks: Arc<QueueLocks>,
    run_lock: Arc<dyn RunLock>,
}

impl QueueExecutionEngine {
    pub fn new(
        store: Arc<dyn QueueStore>,
        executor: Arc<dyn CommandExecutor>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self::with_locks(store, executor, time_provider, Arc::new(QueueLocks::new()))
    }

    /// Share a lock table with other services mutating the same queues
    pub fn with_locks(
        store: Arc<dyn QueueStore>,
        executor: Arc<dyn CommandExecutor>,
        time_provider: Arc<dyn TimeProvider>,
        locks: Arc<QueueLocks>,
    ) -> Self {
        Self {
            store,
            executor,
            time_provider,
            locks,
            run_lock: Arc::new(ProcessRunLock::new()),
        }
    }

    /// Announce running commands through `run_lock` instead of the
    /// process-local default, so recovery elsewhere leaves them alone
    pub fn with_run_lock(mut self, run_lock: Arc<dyn RunLock>) -> Self {
        self.run_lock = run_lock;
        self
    }

    pub fn locks(&self) -> Arc<QueueLocks> {
        Arc::clone(&self.locks)
    }

    pub fn run_lock(&self) -> Arc<dyn RunLock> {
        Arc::clone(&self.run_lock)
    }

    async fn load(&self, id: &QueueId) -> Result<CommandQueue> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(id.clone()))
    }

    /// Run the next actionable command of a queue
    ///
    /// Returns `Idle` for an empty or exhausted queue and `Blocked` when a
    /// Failed command is waiting for `skip`. Positions in the outcome are
    /// 1-based.
    pub async fn execute_next(&self, id: &QueueId) -> Result<StepOutcome> {
        let _guard = self.locks.acquire(id).await?;
        let mut queue = self.load(id).await?;

        let Some(index) = queue.next_actionable_index() else {
            debug!(queue_id = %id, "No pending commands");
            return Ok(StepOutcome::Idle);
        };
        let total = queue.len();

        if queue.commands[index].status == CommandStatus::Failed {
            debug!(queue_id = %id, position = index + 1, "Queue blocked by failed command");
            return Ok(StepOutcome::Blocked {
                position: index + 1,
                command: queue.commands[index].clone(),
            });
        }

        // Held until the outcome is durable
        let _running = self.run_lock.enter().await?;

        let command_text = {
            let cmd = &mut queue.commands[index];
            cmd.start(self.time_provider.now())?;
            cmd.command.clone()
        };
        // Running is durable before anything executes
        self.store.update(id, queue.clone()).await?;

        info!(
            queue_id = %id,
            command_id = %queue.commands[index].id,
            position = index + 1,
            total = total,
            "Executing command"
        );

        let execution = run_isolated(&self.executor, &command_text).await;
        let now = self.time_provider.now();

        let succeeded = {
            let cmd = &mut queue.commands[index];
            match execution {
                Ok(output) if output.success => {
                    cmd.complete(output.to_result(), now)?;
                    true
                }
                Ok(output) => {
                    warn!(
                        queue_id = %id,
                        command_id = %cmd.id,
                        exit_code = output.exit_code,
                        "Command exited with non-zero status"
                    );
                    cmd.fail(
                        format!("command exited with status {}", output.exit_code),
                        Some(output.to_result()),
                        now,
                    )?;
                    false
                }
                Err(e) => {
                    warn!(queue_id = %id, command_id = %cmd.id, error = %e, "Command execution failed");
                    cmd.fail(e.to_string(), None, now)?;
                    false
                }
            }
        };

        if succeeded {
            queue.advance()?;
        }

        let command = queue.commands[index].clone();
        let next = queue.get_next_pending().cloned();

        if let Err(err) = self.store.update(id, queue).await {
            error!(
                queue_id = %id,
                command_id = %command.id,
                status = %command.status,
                error = %err,
                "Failed to persist command outcome"
            );
            return Err(err);
        }

        if succeeded {
            info!(queue_id = %id, command_id = %command.id, "Command completed");
            Ok(StepOutcome::Completed {
                position: index + 1,
                total,
                command,
                next,
            })
        } else {
            Ok(StepOutcome::Failed {
                position: index + 1,
                total,
                command,
            })
        }
    }

    /// Run commands until the queue is exhausted or a command fails
    ///
    /// Requires `auto_execute` on the queue or `force`. The queue lock is
    /// released between steps, so `cancel` and `skip` can interleave.
    pub async fn execute_all(&self, id: &QueueId, force: bool) -> Result<ExecuteAllOutcome> {
        let queue = self.load(id).await?;
        if !queue.auto_execute && !force {
            info!(queue_id = %id, "Queue is not auto-execute; confirmation required");
            return Ok(ExecuteAllOutcome::RequiresConfirmation {
                queue_id: id.clone(),
            });
        }
        let pause = Duration::from_secs(queue.pause_between);

        let mut steps = Vec::new();
        let halted = loop {
            let step = self.execute_next(id).await?;
            if step == StepOutcome::Idle {
                break false;
            }
            let halts = step.halts();
            let more_pending = match &step {
                StepOutcome::Completed { next, .. } => next
                    .as_ref()
                    .is_some_and(|cmd| cmd.status == CommandStatus::Pending),
                _ => false,
            };
            steps.push(step);

            if halts {
                break true;
            }
            if !more_pending {
                break false;
            }
            if !pause.is_zero() {
                debug!(queue_id = %id, pause_secs = pause.as_secs(), "Pausing before next command");
                tokio::time::sleep(pause).await;
            }
        };

        let report = BatchReport {
            queue_id: id.clone(),
            steps,
            halted,
        };
        info!(
            queue_id = %id,
            executed = report.executed(),
            halted = report.halted,
            "Queue run finished"
        );
        Ok(ExecuteAllOutcome::Ran(report))
    }

    /// Mark the Failed command blocking the queue as Skipped
    pub async fn skip(&self, id: &QueueId) -> Result<QueuedCommand> {
        let _guard = self.locks.acquire(id).await?;
        let mut queue = self.load(id).await?;

        let skipped = match queue.skip_current() {
            Ok(Some(cmd)) => cmd.clone(),
            Ok(None) => return Err(AppError::NothingToSkip(id.clone())),
            Err(e) => {
                return Err(AppError::InvalidState(format!(
                    "only a failed command can be skipped ({})",
                    e
                )))
            }
        };

        self.store.update(id, queue).await?;
        info!(queue_id = %id, command_id = %skipped.id, "Skipped failed command");
        Ok(skipped)
    }

    /// Cancel every Pending command at or after the cursor
    pub async fn cancel(&self, id: &QueueId) -> Result<usize> {
        let _guard = self.locks.acquire(id).await?;
        let mut queue = self.load(id).await?;

        let cancelled = queue.cancel_remaining();
        if cancelled > 0 {
            self.store.update(id, queue).await?;
        }
        info!(queue_id = %id, cancelled = cancelled, "Cancelled remaining commands");
        Ok(cancelled)
    }

    /// Per-queue view, or an overview of every queue when `id` is `None`
    pub async fn status(&self, id: Option<&QueueId>) -> Result<StatusReport> {
        match id {
            Some(id) => {
                let queue = self.load(id).await?;
                Ok(StatusReport::Queue(QueueStatusView::from(&queue)))
            }
            None => {
                let mut queues = Vec::new();
                for id in self.store.list().await? {
                    if let Some(queue) = self.store.get(&id).await? {
                        queues.push(queue);
                    }
                }
                Ok(StatusReport::Overall(OverallStatus::from_queues(&queues)))
            }
        }
    }
}

#[cfg(test)]
mod engine_test;
