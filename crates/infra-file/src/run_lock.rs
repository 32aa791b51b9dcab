// RunLock over `<store>.run.lock`, shared by every process using the store

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cmdqueue_core::error::{AppError, Result};
use cmdqueue_core::port::{RunGuard, RunLock};

use crate::lock::{run_lock_path_for, shared, try_exclusive};

/// Executing processes hold the file shared; recovery needs it exclusive
pub struct FileRunLock {
    path: PathBuf,
}

impl FileRunLock {
    /// Run lock for the store document at `store_path`
    pub fn beside(store_path: &Path) -> Self {
        Self {
            path: run_lock_path_for(store_path),
        }
    }
}

#[async_trait]
impl RunLock for FileRunLock {
    async fn enter(&self) -> Result<RunGuard> {
        let path = self.path.clone();
        // Waits only while a recovery sweep holds the file
        let held = tokio::task::spawn_blocking(move || shared(&path))
            .await
            .map_err(|e| AppError::Internal(format!("run lock task failed: {}", e)))??;
        Ok(RunGuard::new(held))
    }

    async fn try_idle(&self) -> Result<Option<RunGuard>> {
        Ok(try_exclusive(&self.path)?.map(RunGuard::new))
    }
}
