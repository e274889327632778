//! Persisted JSON state under the cache root.
//!
//! Each file is read whole and replaced whole. Updates hold an exclusive
//! lock on a sibling `<file>.lock` for the read-modify-write, and the write
//! itself is a temp-file-then-rename, so concurrent writers never lose each
//! other's entries and a crash never leaves a truncated file.

pub mod activation;
pub mod resolutions;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::Result;
use crate::io::{FileLock, write_atomic};

/// Load a state file, treating a missing or unreadable one as empty.
pub(crate) fn load<T: DeserializeOwned + Default>(path: &Path) -> T {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!("Ignoring unreadable state file {}: {e}", path.display());
            return T::default();
        }
    };
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        warn!("Ignoring corrupt state file {}: {e}", path.display());
        T::default()
    })
}

/// Apply `update` to the current contents of `path` and write the result
/// back atomically, under the file's lock.
pub(crate) fn update<T, R>(path: &Path, update: impl FnOnce(&mut T) -> R) -> Result<R>
where
    T: DeserializeOwned + Serialize + Default,
{
    let _lock = FileLock::acquire(&lock_path(path))?;

    let mut state: T = load(path);
    let result = update(&mut state);

    let mut json = serde_json::to_vec_pretty(&state)
        .map_err(|e| crate::Error::io(path, std::io::Error::other(e)))?;
    json.push(b'\n');
    write_atomic(path, &json)?;
    Ok(result)
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}
