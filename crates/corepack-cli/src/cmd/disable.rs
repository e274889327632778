//! Disable command

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use corepack_core::shims;

use super::enable::parse_managers;

/// Remove the shims `enable` created for `names`.
pub fn disable(install_directory: Option<PathBuf>, names: &[String]) -> Result<()> {
    let managers = parse_managers(names)?;
    let target = std::env::current_exe().context("Failed to locate the corepack executable")?;
    let dir = match install_directory {
        Some(dir) => dir,
        None => shims::default_install_dir(&target)?,
    };

    let removed = shims::disable(&dir, &target, &managers)?;
    if removed.is_empty() {
        println!("No shims to remove in {}", dir.display());
    }
    for shim in removed {
        println!("Removed {}", shim.display());
    }
    Ok(())
}
