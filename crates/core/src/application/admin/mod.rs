// Queue Admin Service - create, extend and delete queues

pub mod request;

pub use request::{CreateQueueRequest, NewCommand};

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::constants::MAX_ID_ATTEMPTS;
use crate::application::locks::QueueLocks;
use crate::domain::{CommandQueue, QueueId, QueuedCommand};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, QueueStore, TimeProvider};
use request::{validate_commands, validate_request};

pub struct QueueAdminService {
    store: Arc<dyn QueueStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    locks: Arc<QueueLocks>,
}

impl QueueAdminService {
    /// `locks` must be the table the execution engine uses for the same store
    pub fn new(
        store: Arc<dyn QueueStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        locks: Arc<QueueLocks>,
    ) -> Self {
        Self {
            store,
            id_provider,
            time_provider,
            locks,
        }
    }

    /// Validate and persist a new queue under a freshly generated id
    pub async fn create_queue(&self, req: CreateQueueRequest) -> Result<CommandQueue> {
        validate_request(&req)?;

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = self.id_provider.generate_id();
            let name = req
                .name
                .clone()
                .unwrap_or_else(|| format!("Queue_{}", id));

            let mut queue = CommandQueue::new(id.clone(), name, self.time_provider.now())
                .with_auto_execute(req.auto_execute);
            if let Some(pause) = req.pause_between {
                queue = queue.with_pause_between(pause);
            }
            for cmd in &req.commands {
                queue.add_command(cmd.command.clone(), cmd.description.clone());
            }

            match self.store.create(&id, queue.clone()).await {
                Ok(()) => {
                    info!(
                        queue_id = %id,
                        commands = queue.len(),
                        auto_execute = queue.auto_execute,
                        "Queue created"
                    );
                    return Ok(queue);
                }
                Err(AppError::Conflict(_)) => {
                    warn!(queue_id = %id, attempt = attempt, "Generated queue id already taken");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Internal(format!(
            "no free queue id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    /// Append commands at the tail; returns them as stored
    pub async fn add_commands(
        &self,
        id: &QueueId,
        commands: Vec<NewCommand>,
    ) -> Result<Vec<QueuedCommand>> {
        if commands.is_empty() {
            return Err(AppError::Validation("no commands to add".to_string()));
        }
        validate_commands(&commands)?;

        let _guard = self.locks.acquire(id).await?;
        let mut queue = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(id.clone()))?;

        let first = queue.len();
        for cmd in commands {
            queue.add_command(cmd.command, cmd.description);
        }
        let added = queue.commands[first..].to_vec();

        self.store.update(id, queue).await?;
        info!(queue_id = %id, added = added.len(), "Commands appended");
        Ok(added)
    }

    pub async fn delete_queue(&self, id: &QueueId) -> Result<()> {
        {
            let _guard = self.locks.acquire(id).await?;
            self.store.delete(id).await?;
        }
        self.locks.forget(id);
        info!(queue_id = %id, "Queue deleted");
        Ok(())
    }
}
