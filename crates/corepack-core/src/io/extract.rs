//! Archive extraction
//!
//! Registry tarballs and exported cache archives are both gzip'd tar.

use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Why an archive could not be extracted.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Reading the archive or writing the tree failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// An entry would land outside the extraction root.
    #[error("Invalid path in archive: {0}")]
    InvalidPath(String),
}

/// Extract a gzip'd tar stream into `dest_dir`, dropping the first
/// `strip_components` path components of every entry (npm tarballs wrap
/// everything in `package/`).
///
/// Entries are never written through a symlink: a path whose parent
/// resolves to a link extracted earlier is rejected.
///
/// Returns the number of regular files extracted.
pub fn extract_tar_gz<R: Read>(
    reader: R,
    dest_dir: &Path,
    strip_components: usize,
) -> Result<usize, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let decoder = flate2::read::GzDecoder::new(reader);
    let mut archive = tar::Archive::new(decoder);
    archive.set_preserve_mtime(false);

    let mut extracted = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();

        let Some(relative_path) = sanitize(&entry_path, strip_components)? else {
            continue;
        };
        let absolute_path = dest_dir.join(&relative_path);

        let kind = entry.header().entry_type();
        if !(kind.is_dir() || kind.is_file() || kind.is_symlink()) {
            continue;
        }
        reject_linked_parents(dest_dir, &relative_path)?;

        if kind.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }

        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)?;
        }
        // A later entry replaces an earlier link instead of writing through it.
        if fs::symlink_metadata(&absolute_path).is_ok_and(|m| m.file_type().is_symlink()) {
            fs::remove_file(&absolute_path)?;
        }
        entry.unpack(&absolute_path)?;

        if kind.is_file() {
            extracted += 1;
        }
    }

    Ok(extracted)
}

/// Strip leading components and reject anything that could escape the
/// extraction root. `None` means the entry vanished entirely after
/// stripping (the wrapper directory itself).
fn sanitize(path: &Path, strip_components: usize) -> Result<Option<PathBuf>, ExtractError> {
    let mut relative = PathBuf::new();
    for component in path.components().skip(strip_components) {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ExtractError::InvalidPath(path.display().to_string()));
            }
        }
    }
    Ok((!relative.as_os_str().is_empty()).then_some(relative))
}

/// Fail if any directory between `dest_dir` and `relative` is a symlink.
fn reject_linked_parents(dest_dir: &Path, relative: &Path) -> Result<(), ExtractError> {
    let Some(parent) = relative.parent() else {
        return Ok(());
    };
    let mut current = dest_dir.to_path_buf();
    for component in parent.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(ExtractError::InvalidPath(format!(
                    "{} is below the symlink {}",
                    relative.display(),
                    current.display()
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
