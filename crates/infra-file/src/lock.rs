// Advisory cross-process locks on sibling files of the store document

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use cmdqueue_core::error::{AppError, Result};

/// Guards reads and writes of the document: `<store>.lock`
pub(crate) fn lock_path_for(store_path: &Path) -> PathBuf {
    sibling(store_path, ".lock")
}

/// Held by processes executing commands: `<store>.run.lock`
pub(crate) fn run_lock_path_for(store_path: &Path) -> PathBuf {
    sibling(store_path, ".run.lock")
}

fn sibling(store_path: &Path, suffix: &str) -> PathBuf {
    let mut path = store_path.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| AppError::Storage(format!("cannot open lock file {}: {}", path.display(), e)))
}

#[cfg(unix)]
mod imp {
    use super::*;
    use nix::errno::Errno;
    use nix::fcntl::{Flock, FlockArg};

    /// Held lock; released on drop
    pub(crate) struct StoreLock {
        _flock: Flock<File>,
    }

    fn lock(path: &Path, arg: FlockArg) -> Result<StoreLock> {
        let file = open_lock_file(path)?;
        let flock = Flock::lock(file, arg).map_err(|(_, errno)| {
            AppError::Storage(format!("cannot lock {}: {}", path.display(), errno))
        })?;
        Ok(StoreLock { _flock: flock })
    }

    /// Readers share the lock
    pub(crate) fn shared(path: &Path) -> Result<StoreLock> {
        lock(path, FlockArg::LockShared)
    }

    /// Writers exclude readers and other writers
    pub(crate) fn exclusive(path: &Path) -> Result<StoreLock> {
        lock(path, FlockArg::LockExclusive)
    }

    /// Exclusive without waiting; `None` while anyone else holds the lock
    pub(crate) fn try_exclusive(path: &Path) -> Result<Option<StoreLock>> {
        let file = open_lock_file(path)?;
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(flock) => Ok(Some(StoreLock { _flock: flock })),
            Err((_, Errno::EWOULDBLOCK)) => Ok(None),
            Err((_, errno)) => Err(AppError::Storage(format!(
                "cannot lock {}: {}",
                path.display(),
                errno
            ))),
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::*;

    // No advisory locking off unix; the in-process mutex still serializes writes
    pub(crate) struct StoreLock {
        _file: File,
    }

    pub(crate) fn shared(path: &Path) -> Result<StoreLock> {
        Ok(StoreLock {
            _file: open_lock_file(path)?,
        })
    }

    pub(crate) fn exclusive(path: &Path) -> Result<StoreLock> {
        shared(path)
    }

    pub(crate) fn try_exclusive(path: &Path) -> Result<Option<StoreLock>> {
        shared(path).map(Some)
    }
}

pub(crate) use imp::{exclusive, shared, try_exclusive};
