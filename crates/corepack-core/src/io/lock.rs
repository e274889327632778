//! Cross-process install and state locks.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::FileExt;
use tracing::{debug, trace};

use crate::Result;
use crate::error::IoContext;

/// An exclusive, cross-process advisory lock held for as long as the value
/// lives. Dropping it closes the file, which releases the lock.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock at `path` is ours, creating the file if needed.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .at(path)?;

        trace!("waiting for lock {}", path.display());
        file.lock_exclusive().at(path)?;
        debug!("acquired lock {}", path.display());

        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

}

impl Drop for FileLock {
    fn drop(&mut self) {
        trace!("released lock {}", self.path.display());
    }
}

/// Acquire a lock without blocking the async runtime.
pub async fn acquire_async(path: PathBuf) -> Result<FileLock> {
    tokio::task::spawn_blocking(move || FileLock::acquire(&path)).await?
}
