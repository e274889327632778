//! Enable command

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use corepack_core::shims;
use corepack_schema::PackageManager;

/// Link shims for `names` (every manager when empty) to this executable.
pub fn enable(install_directory: Option<PathBuf>, names: &[String]) -> Result<()> {
    let managers = parse_managers(names)?;
    let target = std::env::current_exe().context("Failed to locate the corepack executable")?;
    let dir = match install_directory {
        Some(dir) => dir,
        None => shims::default_install_dir(&target)?,
    };

    for shim in shims::enable(&dir, &target, &managers)? {
        println!("Linked {}", shim.display());
    }
    Ok(())
}

pub(crate) fn parse_managers(names: &[String]) -> Result<Vec<PackageManager>> {
    names
        .iter()
        .map(|name| {
            name.parse::<PackageManager>()
                .with_context(|| format!("'{name}' is not a package manager corepack supports"))
        })
        .collect()
}
