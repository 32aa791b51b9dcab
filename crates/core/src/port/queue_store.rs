// Queue Store Port (Interface)

use std::collections::BTreeMap;

use crate::domain::{CommandQueue, QueueId};
use crate::error::Result;
use async_trait::async_trait;

/// Durable store for the full set of queues, keyed by queue id
///
/// Contract:
/// - reads are served from memory loaded at construction (or the last `reload`)
/// - a mutation is only reported successful after it is durably committed
/// - a failed commit leaves the visible state exactly as it was before the call
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Persist a new queue
    ///
    /// `InvalidQueueId` for a blank id, `Conflict` if the id already exists.
    async fn create(&self, id: &QueueId, queue: CommandQueue) -> Result<()>;

    /// Snapshot of one queue
    async fn get(&self, id: &QueueId) -> Result<Option<CommandQueue>>;

    /// Replace an existing queue (`NotFound` if absent)
    async fn update(&self, id: &QueueId, queue: CommandQueue) -> Result<()>;

    /// Remove a queue (`NotFound` if absent)
    async fn delete(&self, id: &QueueId) -> Result<()>;

    /// All known queue ids
    async fn list(&self) -> Result<Vec<QueueId>>;

    /// Replace the in-memory view with the current durable state
    ///
    /// For callers that must act on what other writers have committed since
    /// this store was loaded.
    async fn reload(&self) -> Result<()>;
}

/// Swap one map entry, commit, and restore the entry if the commit fails
///
/// `next = Some(v)` inserts/replaces, `next = None` removes. On success the
/// previous value is returned. The commit sees the already-modified map; the
/// map is format-agnostic so any persistence can sit behind `commit`.
pub fn commit_with_rollback<K, V, F>(
    map: &mut BTreeMap<K, V>,
    key: &K,
    next: Option<V>,
    commit: F,
) -> Result<Option<V>>
where
    K: Ord + Clone,
    F: FnOnce(&BTreeMap<K, V>) -> Result<()>,
{
    let previous = swap_entry(map, key, next);

    match commit(map) {
        Ok(()) => Ok(previous),
        Err(err) => {
            swap_entry(map, key, previous);
            Err(err)
        }
    }
}

fn swap_entry<K: Ord + Clone, V>(map: &mut BTreeMap<K, V>, key: &K, next: Option<V>) -> Option<V> {
    match next {
        Some(value) => map.insert(key.clone(), value),
        None => map.remove(key),
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory QueueStore with injectable commit failures
    #[derive(Default)]
    pub struct InMemoryQueueStore {
        queues: Mutex<BTreeMap<QueueId, CommandQueue>>,
        fail_writes: AtomicBool,
        writes: AtomicUsize,
    }

    impl InMemoryQueueStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent commit fail (or succeed again)
        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// Number of successful commits so far
        pub fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        fn commit(&self, _queues: &BTreeMap<QueueId, CommandQueue>) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Storage("injected write failure".to_string()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl QueueStore for InMemoryQueueStore {
        async fn create(&self, id: &QueueId, queue: CommandQueue) -> Result<()> {
            if id.trim().is_empty() {
                return Err(AppError::InvalidQueueId(id.clone()));
            }
            let mut queues = self.queues.lock().unwrap();
            if queues.contains_key(id) {
                return Err(AppError::Conflict(id.clone()));
            }
            commit_with_rollback(&mut *queues, id, Some(queue), |q| self.commit(q)).map(|_| ())
        }

        async fn get(&self, id: &QueueId) -> Result<Option<CommandQueue>> {
            Ok(self.queues.lock().unwrap().get(id).cloned())
        }

        async fn update(&self, id: &QueueId, queue: CommandQueue) -> Result<()> {
            let mut queues = self.queues.lock().unwrap();
            if !queues.contains_key(id) {
                return Err(AppError::NotFound(id.clone()));
            }
            commit_with_rollback(&mut *queues, id, Some(queue), |q| self.commit(q)).map(|_| ())
        }

        async fn delete(&self, id: &QueueId) -> Result<()> {
            let mut queues = self.queues.lock().unwrap();
            if !queues.contains_key(id) {
                return Err(AppError::NotFound(id.clone()));
            }
            commit_with_rollback(&mut *queues, id, None, |q| self.commit(q)).map(|_| ())
        }

        async fn list(&self) -> Result<Vec<QueueId>> {
            Ok(self.queues.lock().unwrap().keys().cloned().collect())
        }

        async fn reload(&self) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_rollback_restores_replaced_value() {
        let mut map = BTreeMap::from([("a".to_string(), 1)]);
        let result = commit_with_rollback(&mut map, &"a".to_string(), Some(2), |m| {
            assert_eq!(m["a"], 2);
            Err(AppError::Storage("disk full".into()))
        });
        assert!(result.is_err());
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn test_rollback_restores_removed_value() {
        let mut map = BTreeMap::from([("a".to_string(), 1)]);
        let result = commit_with_rollback(&mut map, &"a".to_string(), None, |m| {
            assert!(m.is_empty());
            Err(AppError::Storage("disk full".into()))
        });
        assert!(result.is_err());
        assert_eq!(map.get("a"), Some(&1));
    }

    #[test]
    fn test_rollback_removes_inserted_value() {
        let mut map: BTreeMap<String, i32> = BTreeMap::new();
        let result = commit_with_rollback(&mut map, &"a".to_string(), Some(1), |_| {
            Err(AppError::Storage("disk full".into()))
        });
        assert!(result.is_err());
        assert!(map.is_empty());
    }

    #[test]
    fn test_successful_commit_returns_previous() {
        let mut map = BTreeMap::from([("a".to_string(), 1)]);
        let previous =
            commit_with_rollback(&mut map, &"a".to_string(), Some(5), |_| Ok(())).unwrap();
        assert_eq!(previous, Some(1));
        assert_eq!(map["a"], 5);
    }
}
