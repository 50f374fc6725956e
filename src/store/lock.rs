use crate::error::{AlertError, Result};
use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};

/// Exclusive advisory lock held for one load/save cycle.
///
/// Released when dropped, on every exit path.
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Take the lock without waiting; contention is an error
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| {
                AlertError::StateIo(format!("cannot open lock file {}: {}", path.display(), e))
            })?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(AlertError::Locked(format!(
                    "another run holds {}",
                    path.display()
                )));
            }
            Err(TryLockError::Error(e)) => {
                return Err(AlertError::StateIo(format!(
                    "cannot lock {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        tracing::debug!(path = %path.display(), "Acquired state lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), "Failed to release state lock: {}", e);
        }
    }
}
