use crate::{Result, StoreError};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::Duration;

pub(crate) const LOCK_ATTEMPTS: u32 = 5;
pub(crate) const LOCK_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Exclusive advisory lock over one project's knowledge base. Held for the
/// whole read-merge-write sequence; unlocks on drop, so every exit path
/// releases it.
pub struct StoreLock {
    #[allow(dead_code)]
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl StoreLock {
    /// Non-blocking acquisition with bounded retries. Still contended after
    /// the last attempt → `LockContention`; backoff beyond that is the
    /// caller's policy.
    pub(crate) fn acquire(path: &Path, attempts: u32, retry_delay: Duration) -> Result<StoreLock> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let contended_kind = fs2::lock_contended_error().kind();
        for attempt in 0..attempts {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(StoreLock { file }),
                Err(err) if err.kind() == contended_kind => {
                    if attempt + 1 < attempts {
                        log::debug!(
                            "knowledge base lock contended (attempt {}/{attempts}), retrying",
                            attempt + 1
                        );
                        std::thread::sleep(retry_delay);
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(StoreError::LockContention)
    }
}
