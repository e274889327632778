//! `corepack prepare`: resolve, install, and optionally activate or export.

use std::path::{Path, PathBuf};

use corepack_schema::Descriptor;
use tracing::debug;

use crate::archive::{default_archive_name, export};
use crate::install::ensure_package_manager;
use crate::manifest::{Lookup, load_spec};
use crate::resolver::resolve_descriptor;
use crate::state::activation::{activate_package_manager, default_descriptors};
use crate::{Context, Error, InstallRecord, Result};

/// What `prepare` should do.
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// Explicit descriptor; otherwise the project's, or every default with `all`.
    pub descriptor: Option<Descriptor>,
    /// Prepare the default of every manager.
    pub all: bool,
    /// Make the prepared versions the defaults.
    pub activate: bool,
    /// `None`: no archive. `Some(None)`: archive under the default name.
    /// `Some(Some(path))`: archive at `path` (a directory gets the default
    /// name inside it).
    pub output: Option<Option<PathBuf>>,
    /// Where relative outputs and the project lookup start.
    pub cwd: PathBuf,
}

/// Result of [`prepare`].
#[derive(Debug, Clone)]
pub struct PrepareOutcome {
    /// One record per prepared manager, in request order.
    pub installs: Vec<InstallRecord>,
    /// Archive written, if one was requested.
    pub output: Option<PathBuf>,
}

/// Resolve and install each requested descriptor, then activate and export
/// as asked.
pub async fn prepare(ctx: &Context, options: PrepareOptions) -> Result<PrepareOutcome> {
    let explicit = options.descriptor.is_some();
    let descriptors = match (options.descriptor, options.all) {
        (Some(_), true) => {
            return Err(Error::Usage(
                "--all cannot be combined with an explicit descriptor".to_string(),
            ));
        }
        (Some(descriptor), false) => vec![descriptor],
        (None, true) => default_descriptors(&ctx.config),
        (None, false) => vec![project_descriptor(&options.cwd)?],
    };

    let mut installs = Vec::with_capacity(descriptors.len());
    for descriptor in &descriptors {
        let locator = resolve_descriptor(ctx, descriptor).await?;
        let record = ensure_package_manager(ctx, &locator).await?;
        if options.activate {
            activate_package_manager(ctx, &locator).await?;
        }
        installs.push(record);
    }

    let output = match options.output {
        None => None,
        Some(requested) => {
            let named = explicit.then(|| &installs[0].locator);
            let path = archive_path(&options.cwd, requested.as_deref(), &default_archive_name(named));
            export(ctx, &installs, &path).await?;
            ctx.reporter.info(&format!("Packed {}", path.display()));
            Some(path)
        }
    };

    Ok(PrepareOutcome { installs, output })
}

fn project_descriptor(cwd: &Path) -> Result<Descriptor> {
    match load_spec(cwd)? {
        Lookup::Found {
            descriptor,
            manifest,
        } => {
            debug!("preparing {descriptor} from {}", manifest.display());
            Ok(descriptor)
        }
        Lookup::NoSpec { manifest } => Err(Error::NoSpec { manifest }),
        Lookup::NoProject { cwd } => Err(Error::NoProject { cwd }),
    }
}

fn archive_path(cwd: &Path, requested: Option<&Path>, default_name: &str) -> PathBuf {
    match requested {
        None => cwd.join(default_name),
        Some(path) => {
            let path = cwd.join(path);
            if path.is_dir() { path.join(default_name) } else { path }
        }
    }
}
