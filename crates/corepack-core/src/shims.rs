//! `enable` / `disable`: manage the `yarn`, `pnpm`, ... shims.
//!
//! A shim is a symlink named after a binary that points at the corepack
//! executable; corepack recognises the name it was started under.

use std::fs;
use std::path::{Path, PathBuf};

use corepack_schema::{Binary, PackageManager};
#[cfg(unix)]
use tracing::{debug, warn};

#[cfg(unix)]
use crate::error::IoContext;
use crate::{Error, Result};

fn selected(managers: &[PackageManager]) -> impl Iterator<Item = Binary> + '_ {
    Binary::ALL
        .into_iter()
        .filter(move |b| managers.is_empty() || managers.contains(&b.manager()))
}

/// Create shims for `managers` (all of them when empty) in `install_dir`,
/// pointing at `target`. Returns the shims written.
#[cfg(unix)]
pub fn enable(install_dir: &Path, target: &Path, managers: &[PackageManager]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(install_dir).at(install_dir)?;

    let mut written = Vec::new();
    for binary in selected(managers) {
        let shim = install_dir.join(binary.as_str());
        match fs::symlink_metadata(&shim) {
            Ok(meta) if meta.file_type().is_symlink() => {
                fs::remove_file(&shim).at(&shim)?;
            }
            Ok(_) => {
                warn!("Not replacing {}: it is not a symlink", shim.display());
                continue;
            }
            Err(_) => {}
        }
        std::os::unix::fs::symlink(target, &shim).at(&shim)?;
        debug!("linked {} -> {}", shim.display(), target.display());
        written.push(shim);
    }
    Ok(written)
}

/// Remove shims for `managers` (all of them when empty) from `install_dir`
/// that point at `target`. Anything else is left alone. Returns the shims
/// removed.
#[cfg(unix)]
pub fn disable(install_dir: &Path, target: &Path, managers: &[PackageManager]) -> Result<Vec<PathBuf>> {
    let target = fs::canonicalize(target).unwrap_or_else(|_| target.to_path_buf());

    let mut removed = Vec::new();
    for binary in selected(managers) {
        let shim = install_dir.join(binary.as_str());
        let Ok(meta) = fs::symlink_metadata(&shim) else {
            continue;
        };
        if !meta.file_type().is_symlink() {
            continue;
        }
        let points_at_us = fs::canonicalize(&shim).is_ok_and(|resolved| resolved == target);
        if !points_at_us {
            debug!("leaving {}: it belongs to something else", shim.display());
            continue;
        }
        fs::remove_file(&shim).at(&shim)?;
        removed.push(shim);
    }
    Ok(removed)
}

/// Shims are symlinks; unsupported here.
#[cfg(not(unix))]
pub fn enable(_install_dir: &Path, _target: &Path, _managers: &[PackageManager]) -> Result<Vec<PathBuf>> {
    Err(Error::Usage("shims are only supported on Unix".to_string()))
}

/// Shims are symlinks; unsupported here.
#[cfg(not(unix))]
pub fn disable(_install_dir: &Path, _target: &Path, _managers: &[PackageManager]) -> Result<Vec<PathBuf>> {
    Err(Error::Usage("shims are only supported on Unix".to_string()))
}

/// The directory shims go to by default: next to the running executable.
pub fn default_install_dir(executable: &Path) -> Result<PathBuf> {
    executable
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::Usage(format!("cannot determine the directory of {}", executable.display())))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_enable_then_disable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("corepack");
        fs::write(&exe, b"").unwrap();
        let bin = dir.path().join("bin");

        let written = enable(&bin, &exe, &[PackageManager::Yarn]).unwrap();
        assert_eq!(written, vec![bin.join("yarn"), bin.join("yarnpkg")]);
        assert!(!bin.join("pnpm").exists());

        // A foreign npm is never touched.
        fs::write(bin.join("npm"), b"#!/bin/sh\n").unwrap();
        let written = enable(&bin, &exe, &[]).unwrap();
        assert!(!written.contains(&bin.join("npm")));
        assert!(written.contains(&bin.join("pnpx")));

        let removed = disable(&bin, &exe, &[]).unwrap();
        assert_eq!(removed.len(), 5);
        assert!(bin.join("npm").is_file());
        assert!(fs::symlink_metadata(bin.join("yarn")).is_err());
    }
}
