//! "Last known good" package managers.
//!
//! `<home>/lastKnownGood.json` maps a manager name to the reference used
//! when nothing more specific pins one:
//!
//! ```json
//! { "yarn": "1.22.4", "pnpm": "9.15.4" }
//! ```

use std::collections::BTreeMap;

use corepack_schema::{Descriptor, Locator, PackageManager, Reference};
use tracing::{debug, warn};

use crate::defaults::default_descriptor;
use crate::{Config, Context, Result};

/// On-disk shape. Keys stay strings so names this build does not know are
/// carried through untouched.
type LastKnownGood = BTreeMap<String, String>;

/// The activated locator for `manager`, if any.
pub fn activated(config: &Config, manager: PackageManager) -> Option<Locator> {
    let state: LastKnownGood = super::load(&config.last_known_good_path());
    let raw = state.get(manager.as_str())?;
    match raw.parse::<Reference>() {
        Ok(reference) => Some(Locator {
            manager,
            reference,
            integrity: None,
        }),
        Err(e) => {
            warn!("Ignoring activated {manager} reference '{raw}': {e}");
            None
        }
    }
}

/// Record `locator` as the default for its manager. Entries of other
/// managers are left as they are.
pub async fn activate_package_manager(ctx: &Context, locator: &Locator) -> Result<()> {
    let path = ctx.config.last_known_good_path();
    let name = locator.manager.as_str().to_string();
    let reference = locator.reference.to_string();

    debug!("activating {locator}");
    tokio::task::spawn_blocking(move || {
        super::update(&path, |state: &mut LastKnownGood| {
            state.insert(name, reference);
        })
    })
    .await??;

    ctx.reporter.info(&format!("Activated {locator}"));
    Ok(())
}

/// Where a fallback descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    /// Recorded by `--activate`.
    Activation,
    /// Compiled-in default.
    Embedded,
}

/// The descriptor used for `manager` when no project pins one: the
/// activated locator, else the embedded default.
pub fn fallback_descriptor(config: &Config, manager: PackageManager) -> (Descriptor, FallbackSource) {
    match activated(config, manager) {
        Some(locator) => (Descriptor::from(&locator), FallbackSource::Activation),
        None => (default_descriptor(manager), FallbackSource::Embedded),
    }
}

/// One descriptor per supported manager.
pub fn default_descriptors(config: &Config) -> Vec<Descriptor> {
    PackageManager::ALL
        .into_iter()
        .map(|manager| fallback_descriptor(config, manager).0)
        .collect()
}
