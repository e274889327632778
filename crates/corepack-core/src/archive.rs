//! Offline archives of the install cache.
//!
//! An archive is a gzip'd tar whose paths are relative to the cache root
//! (`yarn/2.2.2/package.json`, ...), so extracting it under any cache root
//! reproduces the same layout.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use corepack_schema::{Integrity, Locator, PackageManager, Reference};
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, info};

use crate::error::IoContext;
use crate::install::{InstallRecord, find_installed, lock_blocking, publish_tree, read_marker, staging_dir};
use crate::io::{extract_tar_gz, tree_digest};
use crate::{Config, Context, Error, Result};

/// Archive name used when the caller does not pick one.
///
/// Only an explicitly requested locator puts its version in the name; an
/// export of "whatever is effective" is just `corepack.tgz`.
pub fn default_archive_name(explicit: Option<&Locator>) -> String {
    match explicit {
        Some(locator) => format!(
            "corepack-{}-{}.tgz",
            locator.manager,
            locator.reference.dir_name()
        ),
        None => "corepack.tgz".to_string(),
    }
}

/// Write `records` into a single archive at `output`.
pub async fn export(ctx: &Context, records: &[InstallRecord], output: &Path) -> Result<()> {
    let records = records.to_vec();
    let output = output.to_path_buf();
    let home = ctx.config.home.clone();
    tokio::task::spawn_blocking(move || write_archive(&home, &records, &output)).await?
}

fn write_archive(home: &Path, records: &[InstallRecord], output: &Path) -> Result<()> {
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).at(&parent)?;
    let tmp = tempfile::NamedTempFile::new_in(&parent).at(&parent)?;

    let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    for record in records {
        let relative = record
            .location
            .strip_prefix(home)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| {
                Path::new(record.locator.manager.as_str()).join(record.locator.reference.dir_name())
            });
        debug!("archiving {} as {}", record.location.display(), relative.display());
        builder
            .append_dir_all(&relative, &record.location)
            .at(&record.location)?;
    }
    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .at(output)?;

    tmp.persist(output).map_err(|e| Error::io(output, e.error))?;
    info!("wrote {}", output.display());
    Ok(())
}

/// Import an archive produced by [`export`] into the cache.
///
/// Every `<name>/<reference>` tree is re-hashed and checked against its
/// marker, then published with the same lock and rename as a download.
/// Trees already complete in the cache are left alone. Never touches the
/// network.
pub async fn hydrate(ctx: &Context, archive: &Path) -> Result<Vec<InstallRecord>> {
    let config = ctx.config.clone();
    let archive = archive.to_path_buf();
    let records = tokio::task::spawn_blocking(move || hydrate_blocking(&config, &archive)).await??;

    for record in &records {
        ctx.reporter.installed(record);
    }
    Ok(records)
}

fn hydrate_blocking(config: &Config, archive: &Path) -> Result<Vec<InstallRecord>> {
    let file = File::open(archive).at(archive)?;
    let staging = staging_dir(config)?;
    let files = extract_tar_gz(BufReader::new(file), staging.path(), 0)
        .map_err(|e| Error::Archive(format!("{}: {e}", archive.display())))?;
    debug!("extracted {files} files from {}", archive.display());

    // Every tree is checked before any of them reaches the cache.
    let mut trees = Vec::new();
    for name_dir in sorted_dirs(staging.path())? {
        let manager = dir_name(&name_dir)?
            .parse::<PackageManager>()
            .map_err(|_| {
                Error::Archive(format!(
                    "{}: unexpected top-level entry {}",
                    archive.display(),
                    name_dir.display()
                ))
            })?;

        for tree in sorted_dirs(&name_dir)? {
            trees.push(verify_tree(manager, tree)?);
        }
    }

    if trees.is_empty() {
        return Err(Error::Archive(format!(
            "{} does not contain any package manager",
            archive.display()
        )));
    }

    trees
        .iter()
        .map(|tree| publish_verified(config, tree))
        .collect()
}

/// A staged tree whose content matches its marker.
struct VerifiedTree {
    locator: Locator,
    path: PathBuf,
    hash: Integrity,
}

fn verify_tree(manager: PackageManager, tree: PathBuf) -> Result<VerifiedTree> {
    let dir = dir_name(&tree)?;
    let marker = read_marker(&tree)?;

    // URL references are only recoverable from the marker.
    let reference = match &marker {
        Some(marker) => marker.reference.clone(),
        None => dir
            .parse::<Reference>()
            .map_err(|e| Error::Archive(format!("{}: {e}", tree.display())))?,
    };
    if reference.dir_name() != dir || marker.as_ref().is_some_and(|m| m.name != manager) {
        return Err(Error::Archive(format!(
            "{} does not match its install marker",
            tree.display()
        )));
    }

    let locator = Locator {
        manager,
        reference,
        integrity: None,
    };
    let hash = tree_digest(&tree)?;
    if let Some(expected) = marker.map(|m| m.hash).filter(|expected| *expected != hash) {
        return Err(Error::Integrity {
            subject: locator.to_string(),
            expected: expected.to_string(),
            actual: hash.to_string(),
        });
    }

    Ok(VerifiedTree {
        locator,
        path: tree,
        hash,
    })
}

fn publish_verified(config: &Config, tree: &VerifiedTree) -> Result<InstallRecord> {
    let _lock = lock_blocking(config, &tree.locator)?;
    if let Some(record) = find_installed(config, &tree.locator)? {
        debug!("{} already installed, keeping it", tree.locator);
        return Ok(record);
    }
    publish_tree(config, &tree.locator, &tree.path, Some(&tree.hash))
}

fn sorted_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).at(dir)? {
        let entry = entry.at(dir)?;
        if entry.file_type().at(&entry.path())?.is_dir() {
            dirs.push(entry.path());
        } else {
            return Err(Error::Archive(format!(
                "unexpected file {} in archive",
                entry.file_name().to_string_lossy()
            )));
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Archive(format!("invalid entry name {}", path.display())))
}
