// Run Lock Port (liveness of executing commands)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Held while a command runs; released on drop
pub struct RunGuard {
    _held: Box<dyn Send + Sync>,
}

impl RunGuard {
    pub fn new(held: impl Send + Sync + 'static) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

/// Marks that some owner is executing commands of a store
///
/// Every execution step holds a shared claim from before its command is
/// persisted as Running until its outcome is persisted. Crash recovery may
/// only rewrite Running commands while it holds the idle claim, which is
/// granted only when no step anywhere holds a shared one.
#[async_trait]
pub trait RunLock: Send + Sync {
    /// Shared claim for one execution step; waits while recovery is in progress
    async fn enter(&self) -> Result<RunGuard>;

    /// Exclusive claim, without waiting; `None` while any step is executing
    async fn try_idle(&self) -> Result<Option<RunGuard>>;
}

/// Run lock for a single process
///
/// Counts in-flight steps. Enough when no other process shares the store.
#[derive(Default)]
pub struct ProcessRunLock {
    active: Arc<AtomicUsize>,
}

impl ProcessRunLock {
    pub fn new() -> Self {
        Self::default()
    }
}

struct ActiveStep(Arc<AtomicUsize>);

impl Drop for ActiveStep {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RunLock for ProcessRunLock {
    async fn enter(&self) -> Result<RunGuard> {
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(RunGuard::new(ActiveStep(Arc::clone(&self.active))))
    }

    async fn try_idle(&self) -> Result<Option<RunGuard>> {
        if self.active.load(Ordering::SeqCst) == 0 {
            Ok(Some(RunGuard::new(())))
        } else {
            Ok(None)
        }
    }
}
