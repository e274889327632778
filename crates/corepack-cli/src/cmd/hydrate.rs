//! Hydrate command

use std::path::Path;

use anyhow::{Context as _, Result};
use corepack_core::Context;
use corepack_core::archive::hydrate as hydrate_archive;
use corepack_core::state::activation::activate_package_manager;

/// Import `archive` into the cache, optionally activating what it held.
pub async fn hydrate(ctx: &Context, archive: &Path, activate: bool) -> Result<()> {
    let records = hydrate_archive(ctx, archive)
        .await
        .with_context(|| format!("Failed to hydrate {}", archive.display()))?;

    for record in &records {
        if activate {
            activate_package_manager(ctx, &record.locator).await?;
        }
        println!("Hydrated {}", record.locator);
    }
    Ok(())
}
