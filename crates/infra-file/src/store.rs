// JSON file QueueStore Implementation

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use cmdqueue_core::domain::{CommandQueue, QueueId};
use cmdqueue_core::error::{AppError, Result};
use cmdqueue_core::port::queue_store::commit_with_rollback;
use cmdqueue_core::port::QueueStore;
use tracing::{debug, info, warn};

use crate::codec::{decode_queues, encode_queues};
use crate::lock::{exclusive, lock_path_for, shared};

const TEMP_PREFIX: &str = ".queues_";
const TEMP_SUFFIX: &str = ".tmp";

type QueueMap = BTreeMap<QueueId, CommandQueue>;

/// Every queue in one JSON document, replaced atomically on each mutation
///
/// Reads are served from the map loaded at `open` (or `reload`). A mutation
/// holds the map mutex and an exclusive lock on `<path>.lock`, re-reads the
/// document so changes committed by other processes to other queues are kept,
/// applies its one entry and rewrites the whole document through a temp file
/// + rename. If the write fails the entry is restored and the error returned.
///
/// File work runs on the blocking pool.
pub struct JsonFileQueueStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    lock_path: PathBuf,
    queues: Mutex<QueueMap>,
}

impl JsonFileQueueStore {
    /// Open (or start) a store at `path`, creating the parent directory
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(parent_dir(&path)).map_err(|e| {
            AppError::Storage(format!(
                "cannot create store directory for {}: {}",
                path.display(),
                e
            ))
        })?;
        let lock_path = lock_path_for(&path);
        let queues = load(&path, &lock_path)?;

        info!(path = %path.display(), queues = queues.len(), "Queue store opened");
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                lock_path,
                queues: Mutex::new(queues),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&inner))
            .await
            .map_err(|e| AppError::Internal(format!("queue store task failed: {}", e)))?
    }
}

impl Inner {
    fn queues(&self) -> Result<MutexGuard<'_, QueueMap>> {
        self.queues
            .lock()
            .map_err(|_| AppError::Internal("queue store mutex poisoned".to_string()))
    }

    fn save_failed(&self, e: impl std::fmt::Display) -> AppError {
        AppError::Storage(format!(
            "failed to save queues to {}: {}",
            self.path.display(),
            e
        ))
    }

    fn read_failed(&self, e: impl std::fmt::Display) -> AppError {
        AppError::Storage(format!(
            "failed to read queues from {}: {}",
            self.path.display(),
            e
        ))
    }

    /// Apply one entry change on top of the current document
    ///
    /// `check` sees the freshly read map and may veto the change.
    fn commit<C>(&self, id: &QueueId, next: Option<CommandQueue>, check: C) -> Result<()>
    where
        C: FnOnce(&QueueMap) -> Result<()>,
    {
        let mut queues = self.queues()?;
        let _lock = exclusive(&self.lock_path)?;
        *queues = read_document(&self.path).map_err(|e| self.read_failed(e))?;
        check(&queues)?;
        commit_with_rollback(&mut *queues, id, next, |q| self.write(q))?;
        Ok(())
    }

    fn reload(&self) -> Result<usize> {
        let mut queues = self.queues()?;
        let _lock = shared(&self.lock_path)?;
        *queues = read_document(&self.path).map_err(|e| self.read_failed(e))?;
        Ok(queues.len())
    }

    /// Write the full map durably: temp file, fsync, rename, fsync dir
    ///
    /// Caller holds the exclusive lock.
    fn write(&self, queues: &QueueMap) -> Result<()> {
        let payload = encode_queues(queues)?;
        let dir = parent_dir(&self.path);

        // Dropping `temp` on any early return removes the file
        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(dir)
            .map_err(|e| self.save_failed(e))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            writer.write_all(&payload).map_err(|e| self.save_failed(e))?;
            writer.flush().map_err(|e| self.save_failed(e))?;
        }
        temp.as_file().sync_all().map_err(|e| self.save_failed(e))?;
        temp.persist(&self.path).map_err(|e| self.save_failed(e.error))?;

        if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
            debug!(error = %e, "Directory fsync after rename failed");
        }

        debug!(path = %self.path.display(), queues = queues.len(), "Queue store flushed");
        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Current durable state; a missing document is an empty store
fn read_document(path: &Path) -> std::io::Result<QueueMap> {
    match fs::read(path) {
        Ok(raw) => Ok(decode_queues(&raw, Utc::now())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e),
    }
}

fn load(path: &Path, lock_path: &Path) -> Result<QueueMap> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let _lock = shared(lock_path)?;
    match read_document(path) {
        Ok(queues) => Ok(queues),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read queue store; starting empty");
            Ok(BTreeMap::new())
        }
    }
}

#[async_trait]
impl QueueStore for JsonFileQueueStore {
    async fn create(&self, id: &QueueId, queue: CommandQueue) -> Result<()> {
        if id.trim().is_empty() {
            return Err(AppError::InvalidQueueId(id.clone()));
        }
        let id = id.clone();
        self.blocking(move |inner| {
            inner.commit(&id, Some(queue), |queues| {
                if queues.contains_key(&id) {
                    return Err(AppError::Conflict(id.clone()));
                }
                Ok(())
            })
        })
        .await
    }

    async fn get(&self, id: &QueueId) -> Result<Option<CommandQueue>> {
        Ok(self.inner.queues()?.get(id).cloned())
    }

    async fn update(&self, id: &QueueId, queue: CommandQueue) -> Result<()> {
        let id = id.clone();
        self.blocking(move |inner| inner.commit(&id, Some(queue), |queues| present(queues, &id)))
            .await
    }

    async fn delete(&self, id: &QueueId) -> Result<()> {
        let id = id.clone();
        self.blocking(move |inner| inner.commit(&id, None, |queues| present(queues, &id)))
            .await
    }

    async fn list(&self) -> Result<Vec<QueueId>> {
        Ok(self.inner.queues()?.keys().cloned().collect())
    }

    async fn reload(&self) -> Result<()> {
        let count = self.blocking(|inner| inner.reload()).await?;
        debug!(path = %self.path().display(), queues = count, "Queue store reloaded");
        Ok(())
    }
}

fn present(queues: &QueueMap, id: &QueueId) -> Result<()> {
    if queues.contains_key(id) {
        Ok(())
    } else {
        Err(AppError::NotFound(id.clone()))
    }
}
