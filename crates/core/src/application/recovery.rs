// Crash recovery for commands interrupted mid-execution
use crate::application::constants::INTERRUPTED_ERROR;
use crate::domain::CommandStatus;
use crate::port::{QueueStore, RunLock, TimeProvider};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Crash recovery service
///
/// On startup, finds commands that were Running when their process died and
/// marks them Failed. Their outcome is unknown, so they are never re-run
/// automatically; an operator decides with `skip`.
///
/// A Running command is only orphaned when no owner is executing, which the
/// shared `RunLock` tells apart.
pub struct RecoveryService {
    store: Arc<dyn QueueStore>,
    run_lock: Arc<dyn RunLock>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RecoveryService {
    pub fn new(
        store: Arc<dyn QueueStore>,
        run_lock: Arc<dyn RunLock>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            run_lock,
            time_provider,
        }
    }

    /// Fail every Running command in every queue, if nothing is executing
    ///
    /// While any owner holds the run lock this is a no-op returning 0; the
    /// orphans are picked up by a later call. Otherwise the store is reloaded
    /// under the idle claim so the sweep sees every committed outcome. A queue
    /// whose write fails is logged and left as-is; the rest are still
    /// recovered.
    ///
    /// # Returns
    /// Number of commands recovered
    pub async fn recover_interrupted(&self) -> crate::error::Result<usize> {
        let Some(_idle) = self.run_lock.try_idle().await? else {
            debug!("Commands are executing elsewhere; crash recovery deferred");
            return Ok(0);
        };
        self.store.reload().await?;

        let now = self.time_provider.now();
        let mut recovered_count = 0;

        for id in self.store.list().await? {
            let Some(mut queue) = self.store.get(&id).await? else {
                continue;
            };

            let mut interrupted = 0;
            for cmd in queue
                .commands
                .iter_mut()
                .filter(|c| c.status == CommandStatus::Running)
            {
                warn!(
                    queue_id = %id,
                    command_id = %cmd.id,
                    "Command was running when the process exited; marking failed"
                );
                cmd.fail(INTERRUPTED_ERROR, None, now)?;
                interrupted += 1;
            }

            if interrupted == 0 {
                continue;
            }

            match self.store.update(&id, queue).await {
                Ok(()) => recovered_count += interrupted,
                Err(e) => {
                    error!(queue_id = %id, error = %e, "Failed to persist recovered queue");
                }
            }
        }

        if recovered_count > 0 {
            info!(recovered = recovered_count, "Interrupted command recovery completed");
        }
        Ok(recovered_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CommandQueue;
    use crate::port::queue_store::mocks::InMemoryQueueStore;
    use crate::port::ProcessRunLock;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use chrono::{TimeZone, Utc};

    fn clock() -> Arc<FixedTimeProvider> {
        Arc::new(FixedTimeProvider::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ))
    }

    async fn seed_running(store: &InMemoryQueueStore, id: &str) {
        let mut queue = CommandQueue::new(id, "Interrupted", clock().now());
        queue.add_command("sleep 60", "Long");
        queue.add_command("echo done", "After");
        queue.command_mut(0).unwrap().start(clock().now()).unwrap();
        store.create(&id.to_string(), queue).await.unwrap();
    }

    #[tokio::test]
    async fn test_running_commands_become_failed() {
        let store = Arc::new(InMemoryQueueStore::new());
        seed_running(&store, "q1").await;
        let recovery = RecoveryService::new(store.clone(), Arc::new(ProcessRunLock::new()), clock());

        assert_eq!(recovery.recover_interrupted().await.unwrap(), 1);

        let queue = store.get(&"q1".to_string()).await.unwrap().unwrap();
        let cmd = &queue.commands[0];
        assert_eq!(cmd.status, CommandStatus::Failed);
        assert_eq!(cmd.error.as_deref(), Some(INTERRUPTED_ERROR));
        assert!(cmd.result.is_none());
        assert_eq!(cmd.end_time, Some(clock().now()));
        assert_eq!(queue.commands[1].status, CommandStatus::Pending);
        assert_eq!(queue.current_index, 0);
    }

    #[tokio::test]
    async fn test_clean_store_is_untouched() {
        let store = Arc::new(InMemoryQueueStore::new());
        let mut queue = CommandQueue::new("q1", "Idle", clock().now());
        queue.add_command("echo a", "A");
        store.create(&"q1".to_string(), queue).await.unwrap();
        let writes = store.write_count();

        let recovery = RecoveryService::new(store.clone(), Arc::new(ProcessRunLock::new()), clock());
        assert_eq!(recovery.recover_interrupted().await.unwrap(), 0);
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_write_failure_is_not_counted() {
        let store = Arc::new(InMemoryQueueStore::new());
        seed_running(&store, "q1").await;
        store.set_fail_writes(true);

        let recovery = RecoveryService::new(store.clone(), Arc::new(ProcessRunLock::new()), clock());
        assert_eq!(recovery.recover_interrupted().await.unwrap(), 0);

        let queue = store.get(&"q1".to_string()).await.unwrap().unwrap();
        assert_eq!(queue.commands[0].status, CommandStatus::Running);
    }

    #[tokio::test]
    async fn test_running_command_with_live_owner_is_left_alone() {
        let store = Arc::new(InMemoryQueueStore::new());
        seed_running(&store, "q1").await;
        let run_lock = Arc::new(ProcessRunLock::new());
        let owner = run_lock.enter().await.unwrap();
        let writes = store.write_count();

        let recovery = RecoveryService::new(store.clone(), run_lock.clone(), clock());
        assert_eq!(recovery.recover_interrupted().await.unwrap(), 0);
        assert_eq!(store.write_count(), writes);
        let queue = store.get(&"q1".to_string()).await.unwrap().unwrap();
        assert_eq!(queue.commands[0].status, CommandStatus::Running);

        // Owner gone without persisting an outcome
        drop(owner);
        assert_eq!(recovery.recover_interrupted().await.unwrap(), 1);
    }
}
