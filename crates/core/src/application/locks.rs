// Per-queue execution locks

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::QueueId;
use crate::error::{AppError, Result};

/// One async mutex per queue id
///
/// Every read-modify-write of a queue (an execution step, skip, cancel,
/// append) holds that queue's lock, so exactly one step runs per queue while
/// different queues proceed concurrently.
#[derive(Default)]
pub struct QueueLocks {
    inner: Mutex<HashMap<QueueId, Arc<AsyncMutex<()>>>>,
}

impl QueueLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: &QueueId) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut map = self
                .inner
                .lock()
                .map_err(|_| AppError::Internal("queue lock table poisoned".to_string()))?;
            Arc::clone(map.entry(id.clone()).or_default())
        };
        Ok(lock.lock_owned().await)
    }

    /// Drop the lock entry of a deleted queue
    pub fn forget(&self, id: &QueueId) {
        if let Ok(mut map) = self.inner.lock() {
            map.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_queue_is_serialized() {
        let locks = Arc::new(QueueLocks::new());
        let id = "q1".to_string();

        let guard = locks.acquire(&id).await.unwrap();
        let contender = {
            let locks = Arc::clone(&locks);
            let id = id.clone();
            tokio::spawn(async move { locks.acquire(&id).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_different_queues_do_not_block() {
        let locks = QueueLocks::new();
        let _a = locks.acquire(&"q1".to_string()).await.unwrap();
        let b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&"q2".to_string()),
        )
        .await;
        assert!(b.is_ok());
    }
}
