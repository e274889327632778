//! Crash-safe file replacement.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::IoContext;
use crate::{Error, Result};

/// Replace `path` with `contents` in a single rename.
///
/// The data goes to a temporary file in the same directory first, so
/// readers see either the old file or the new one, never a truncated mix.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Usage(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(parent).at(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).at(parent)?;
    tmp.write_all(contents).at(tmp.path())?;
    tmp.as_file().sync_all().at(tmp.path())?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}
