//! Dependency wiring (composition root)

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use cmdqueue_core::application::{QueueAdminService, QueueExecutionEngine, RecoveryService};
use cmdqueue_core::port::id_provider::{SequentialIdProvider, UuidProvider};
use cmdqueue_core::port::time_provider::SystemTimeProvider;
use cmdqueue_core::port::{IdProvider, QueueStore, RunLock, TimeProvider};
use cmdqueue_infra_file::{FileRunLock, JsonFileQueueStore};
use cmdqueue_infra_system::ShellExecutor;

use crate::config::{IdStyle, Settings};

const QUEUE_ID_PREFIX: &str = "q";

pub struct App {
    pub engine: QueueExecutionEngine,
    pub admin: QueueAdminService,
    recovery: RecoveryService,
}

impl App {
    pub async fn build(settings: &Settings) -> Result<Self> {
        info!(store_path = %settings.store_path.display(), "Opening queue store...");
        let store: Arc<dyn QueueStore> = Arc::new(
            JsonFileQueueStore::open(&settings.store_path)
                .with_context(|| format!("Failed to open {}", settings.store_path.display()))?,
        );
        let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);

        let id_provider: Arc<dyn IdProvider> = match settings.id_style {
            IdStyle::Sequential => {
                let existing = store.list().await?.len() as u64;
                Arc::new(SequentialIdProvider::starting_after(
                    QUEUE_ID_PREFIX,
                    existing,
                ))
            }
            IdStyle::Uuid => Arc::new(UuidProvider),
        };

        let executor = Arc::new(
            ShellExecutor::new(time_provider.clone(), settings.executor.env_allowlist.clone())
                .with_timeout(settings.executor.timeout())
                .with_remote(settings.executor.remote.clone()),
        );

        // Shared with every other cmdqueue process on this store
        let run_lock: Arc<dyn RunLock> = Arc::new(FileRunLock::beside(&settings.store_path));

        let engine = QueueExecutionEngine::new(store.clone(), executor, time_provider.clone())
            .with_run_lock(run_lock.clone());
        let admin = QueueAdminService::new(
            store.clone(),
            id_provider,
            time_provider.clone(),
            engine.locks(),
        );
        let recovery = RecoveryService::new(store, run_lock, time_provider);

        Ok(Self {
            engine,
            admin,
            recovery,
        })
    }

    /// Fail commands left Running by a process that is gone
    ///
    /// Deferred while any process is executing commands of this store.
    pub async fn recover(&self) {
        match self.recovery.recover_interrupted().await {
            Ok(0) => {}
            Ok(count) => info!(recovered_commands = count, "Crash recovery completed"),
            Err(e) => error!(error = ?e, "Crash recovery failed"),
        }
    }
}
