//! Clean command (garbage collection)

use anyhow::Result;
use corepack_core::Config;
use corepack_core::clean::clean as clean_cache;

/// Garbage collect orphaned staging directories and stale resolutions
pub fn clean(config: &Config) -> Result<()> {
    let report = clean_cache(config)?;
    println!(
        "Removed {} leftover install(s) and {} stale resolution(s) from {}",
        report.tmp_removed,
        report.resolutions_pruned,
        config.home.display()
    );
    Ok(())
}
