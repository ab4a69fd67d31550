//! Advisory file locking so at most one runner owns a job at a time.

use super::store::StateError;
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Exclusive per-job lock, held until dropped.
pub struct JobLock {
    #[allow(dead_code)]
    lock: RwLock<File>,
}

impl JobLock {
    /// Try to acquire the exclusive lock for `job_id` without blocking.
    ///
    /// Returns a `Lock` error immediately if another process holds it.
    pub fn try_acquire(dir: &Path, job_id: &str) -> Result<Self, StateError> {
        std::fs::create_dir_all(dir).map_err(|e| StateError::Io(e.to_string()))?;

        let lock_path = dir.join(format!("{job_id}.lock"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StateError::Lock(format!("failed to open lock file: {e}")))?;

        let mut lock = RwLock::new(file);

        let guard = lock
            .try_write()
            .map_err(|e| StateError::Lock(format!("job {job_id} is already locked: {e}")))?;

        // Dropping the guard would release the flock immediately. Forget it
        // instead; the fd stays locked until the File closes on drop.
        std::mem::forget(guard);

        Ok(Self { lock })
    }
}
