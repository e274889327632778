//! The install cache.
//!
//! Each locator is installed at `<home>/<name>/<reference>/`. A directory
//! there only counts once it carries the install marker, and the marker is
//! written into the staging directory before the single rename that
//! publishes it, so no process ever sees a half-installed tree.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use corepack_schema::{INSTALL_MARKER, Integrity, Locator, PackageManager, Reference};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::IoContext;
use crate::io::{FileLock, extract_tar_gz, lock, tree_digest, write_atomic};
use crate::registry::source_for;
use crate::{Config, Context, Error, Result};

/// A complete, verified install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRecord {
    /// What was installed.
    pub locator: Locator,
    /// Install directory.
    pub location: PathBuf,
    /// Digest of the installed tree.
    pub hash: Integrity,
}

/// Contents of the install marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallMarker {
    /// Manager the tree belongs to.
    pub name: PackageManager,
    /// Installed version or URL.
    pub reference: Reference,
    /// Digest of the tree at install time.
    pub hash: Integrity,
}

/// Read the marker inside `dir`, if there is a valid one.
pub fn read_marker(dir: &Path) -> Result<Option<InstallMarker>> {
    let path = dir.join(INSTALL_MARKER);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).at(&path),
    };
    match serde_json::from_slice(&bytes) {
        Ok(marker) => Ok(Some(marker)),
        Err(e) => {
            warn!("Ignoring invalid install marker {}: {e}", path.display());
            Ok(None)
        }
    }
}

fn write_marker(dir: &Path, marker: &InstallMarker) -> Result<()> {
    let path = dir.join(INSTALL_MARKER);
    let json = serde_json::to_vec_pretty(marker)
        .map_err(|e| Error::io(&path, std::io::Error::other(e)))?;
    write_atomic(&path, &json)
}

/// The install for `locator`, if it is complete.
pub fn find_installed(config: &Config, locator: &Locator) -> Result<Option<InstallRecord>> {
    let location = config.install_dir(locator);
    let Some(marker) = read_marker(&location)? else {
        return Ok(None);
    };
    if marker.name != locator.manager || marker.reference != locator.reference {
        warn!(
            "Install marker in {} describes {}@{}",
            location.display(),
            marker.name,
            marker.reference
        );
        return Ok(None);
    }
    Ok(Some(InstallRecord {
        locator: locator.clone(),
        location,
        hash: marker.hash,
    }))
}

/// Make sure `locator` is installed, downloading it if needed.
///
/// Callers racing on the same locator (in this process or another) block
/// on the per-locator lock; whoever gets it second finds the install
/// complete and returns without downloading.
pub async fn ensure_package_manager(ctx: &Context, locator: &Locator) -> Result<InstallRecord> {
    let config = &ctx.config;
    if let Some(record) = find_installed(config, locator)? {
        debug!("{locator} already installed at {}", record.location.display());
        return Ok(record);
    }

    let _lock = lock::acquire_async(config.install_lock_path(locator)).await?;
    if let Some(record) = find_installed(config, locator)? {
        debug!("{locator} was installed while waiting for the lock");
        return Ok(record);
    }

    if !config.enable_network {
        return Err(Error::NetworkDisabled {
            manager: locator.manager,
            range: locator.reference.to_string(),
        });
    }

    let (url, expected) = download_target(ctx, locator).await?;
    if expected.is_none() {
        ctx.reporter.warning(&format!(
            "No integrity information for {locator}; installing without verification"
        ));
    }

    ctx.reporter.downloading(locator, &url);
    let bytes = ctx.registry.fetch(&url).await?;
    if let Some(expected) = &expected {
        expected.verify(&bytes).map_err(|m| Error::Integrity {
            subject: locator.to_string(),
            expected: m.expected,
            actual: m.actual,
        })?;
    }

    let config = ctx.config.clone();
    let target = locator.clone();
    let record =
        tokio::task::spawn_blocking(move || install_archive(&config, &target, &bytes)).await??;

    info!("installed {locator} at {}", record.location.display());
    ctx.reporter.installed(&record);
    Ok(record)
}

/// Where to download `locator` from and what it must hash to.
///
/// The descriptor's integrity wins over the registry's.
async fn download_target(ctx: &Context, locator: &Locator) -> Result<(String, Option<Integrity>)> {
    match &locator.reference {
        Reference::Url(url) => Ok((url.clone(), locator.integrity.clone())),
        Reference::Version(version) => {
            let source = source_for(locator.manager, version);
            let metadata = ctx.registry.package_metadata(source.package).await?;
            let dist = metadata
                .versions
                .get(&version.to_string())
                .map(|v| v.dist.clone())
                .ok_or_else(|| Error::Resolution {
                    manager: locator.manager,
                    range: version.to_string(),
                })?;

            let registry_integrity = match dist.integrity.as_deref().map(Integrity::parse_sri) {
                Some(Ok(integrity)) => Some(integrity),
                Some(Err(e)) => {
                    warn!("Ignoring registry integrity for {locator}: {e}");
                    None
                }
                None => None,
            };
            Ok((dist.tarball, locator.integrity.clone().or(registry_integrity)))
        }
    }
}

/// Extract a verified archive into a staging directory and publish it.
/// The caller holds the locator's lock.
fn install_archive(config: &Config, locator: &Locator, archive: &Bytes) -> Result<InstallRecord> {
    let staging = staging_dir(config)?;
    let tree = staging.path().join("pkg");
    let files =
        extract_tar_gz(archive.as_ref(), &tree, 1).map_err(|e| Error::Archive(e.to_string()))?;
    if files == 0 {
        return Err(Error::Archive(format!("the archive for {locator} contains no files")));
    }
    debug!("extracted {files} files for {locator}");
    publish_tree(config, locator, &tree, None)
}

/// A fresh temporary directory on the same volume as the installs.
pub(crate) fn staging_dir(config: &Config) -> Result<tempfile::TempDir> {
    let tmp = config.tmp_dir();
    fs::create_dir_all(&tmp).at(&tmp)?;
    tempfile::Builder::new()
        .prefix("install-")
        .tempdir_in(&tmp)
        .at(&tmp)
}

/// Hash `tree`, mark it complete and rename it into place.
///
/// When `expected` is given the tree must hash to it. The caller holds the
/// locator's lock.
pub(crate) fn publish_tree(
    config: &Config,
    locator: &Locator,
    tree: &Path,
    expected: Option<&Integrity>,
) -> Result<InstallRecord> {
    let hash = tree_digest(tree)?;
    if let Some(expected) = expected {
        if *expected != hash {
            return Err(Error::Integrity {
                subject: locator.to_string(),
                expected: expected.to_string(),
                actual: hash.to_string(),
            });
        }
    }

    let marker = InstallMarker {
        name: locator.manager,
        reference: locator.reference.clone(),
        hash: hash.clone(),
    };
    write_marker(tree, &marker)?;

    let location = config.install_dir(locator);
    if let Some(parent) = location.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    if location.exists() {
        // Only reachable for a directory without a valid marker.
        warn!("Replacing incomplete install at {}", location.display());
        fs::remove_dir_all(&location).at(&location)?;
    }
    fs::rename(tree, &location).at(&location)?;

    Ok(InstallRecord {
        locator: locator.clone(),
        location,
        hash,
    })
}

/// Lock `locator` from blocking code.
pub(crate) fn lock_blocking(config: &Config, locator: &Locator) -> Result<FileLock> {
    FileLock::acquire(&config.install_lock_path(locator))
}
