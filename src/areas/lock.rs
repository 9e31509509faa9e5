//! Per-repository operation lock
//!
//! Mutating operations hold an exclusive advisory lock on `.knot/knot.lock`
//! for their whole duration. The OS drops the lock with the process, so a
//! lock file left behind by a killed holder never blocks later commands.
//!
//! `fcntl` locks are owned by the process rather than the handle, so holders
//! inside one process are also tracked in a process-wide set. A path stays in
//! that set until its file lock is released and the file closed.

use crate::artifacts::core::error::KnotError;
use anyhow::Context;
use file_guard::FileGuard;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const LOCK_FILE: &str = "knot.lock";

const LOCK_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(10);

static HELD_IN_PROCESS: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());

fn held_in_process() -> MutexGuard<'static, BTreeSet<PathBuf>> {
    HELD_IN_PROCESS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct RepositoryLock {
    path: PathBuf,
    guard: Option<FileGuard<Box<File>>>,
}

impl RepositoryLock {
    /// Take the lock, retrying with exponential backoff while someone else holds it
    pub async fn acquire(repository_dir: &Path) -> anyhow::Result<Self> {
        let repository_dir = repository_dir
            .canonicalize()
            .with_context(|| format!("Unable to resolve {}", repository_dir.display()))?;
        let path = repository_dir.join(LOCK_FILE);
        let mut backoff = INITIAL_BACKOFF;

        for attempt in 1..=LOCK_ATTEMPTS {
            if let Some(lock) = Self::try_acquire(&path)? {
                tracing::debug!(path = %path.display(), attempt, "lock acquired");
                return Ok(lock);
            }

            if attempt < LOCK_ATTEMPTS {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        Err(KnotError::LockContention {
            path,
            attempts: LOCK_ATTEMPTS,
        }
        .into())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_acquire(path: &Path) -> anyhow::Result<Option<Self>> {
        // the file must not be opened while another handle here holds it:
        // closing any descriptor drops the process's fcntl locks on it
        if !held_in_process().insert(path.to_path_buf()) {
            return Ok(None);
        }

        match Self::lock_file(path) {
            Ok(Some(guard)) => Ok(Some(RepositoryLock {
                path: path.to_path_buf(),
                guard: Some(guard),
            })),
            Ok(None) => {
                held_in_process().remove(path);
                Ok(None)
            }
            Err(err) => {
                held_in_process().remove(path);
                Err(err)
            }
        }
    }

    fn lock_file(path: &Path) -> anyhow::Result<Option<FileGuard<Box<File>>>> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Unable to open lock file {}", path.display()))?;

        match file_guard::try_lock(Box::new(file), file_guard::Lock::Exclusive, 0, 1) {
            Ok(guard) => Ok(Some(guard)),
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::PermissionDenied
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("Unable to lock {}", path.display()))),
        }
    }
}

impl Drop for RepositoryLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        held_in_process().remove(&self.path);
    }
}
