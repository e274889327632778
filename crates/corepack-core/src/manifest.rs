//! Project manifest discovery.
//!
//! Walks from a directory up to the filesystem root looking for the nearest
//! `package.json` that declares a `packageManager` field.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use corepack_schema::Descriptor;
use serde_json::Value;
use tracing::trace;

use crate::error::IoContext;
use crate::{Error, Result};

/// File searched for while walking up.
pub const MANIFEST_NAME: &str = "package.json";
const FIELD: &str = "packageManager";

/// Outcome of a manifest lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// No manifest anywhere between the start directory and the root.
    NoProject {
        /// Where the walk started.
        cwd: PathBuf,
    },
    /// Manifests exist but none declares a package manager. Carries the
    /// nearest one.
    NoSpec {
        /// The nearest manifest.
        manifest: PathBuf,
    },
    /// The deepest manifest declaring a package manager.
    Found {
        /// The declared descriptor.
        descriptor: Descriptor,
        /// The manifest declaring it.
        manifest: PathBuf,
    },
}

/// Find the package manager declared for `start`.
///
/// Directories inside `node_modules` are skipped, since a dependency's
/// manifest never pins the project's manager.
pub fn load_spec(start: &Path) -> Result<Lookup> {
    let mut nearest: Option<PathBuf> = None;

    for dir in start.ancestors() {
        if is_inside_node_modules(dir) {
            continue;
        }
        let candidate = dir.join(MANIFEST_NAME);
        let Some(document) = read_manifest(&candidate)? else {
            continue;
        };
        trace!("found manifest {}", candidate.display());

        match document.get(FIELD) {
            None | Some(Value::Null) => {
                nearest.get_or_insert(candidate);
            }
            Some(Value::String(raw)) => {
                let descriptor = Descriptor::parse(raw, &candidate.display().to_string())?;
                return Ok(Lookup::Found {
                    descriptor,
                    manifest: candidate,
                });
            }
            Some(_) => {
                return Err(Error::Manifest {
                    path: candidate,
                    reason: format!("\"{FIELD}\" must be a string"),
                });
            }
        }
    }

    Ok(match nearest {
        Some(manifest) => Lookup::NoSpec { manifest },
        None => Lookup::NoProject {
            cwd: start.to_path_buf(),
        },
    })
}

fn is_inside_node_modules(dir: &Path) -> bool {
    dir.components()
        .any(|c| matches!(c, Component::Normal(name) if name == "node_modules"))
}

fn read_manifest(path: &Path) -> Result<Option<Value>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) => {
            return Ok(None);
        }
        Err(e) => return Err(e).at(path),
    };
    let value: Value = serde_json::from_str(&text).map_err(|e| Error::Manifest {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !value.is_object() {
        return Err(Error::Manifest {
            path: path.to_path_buf(),
            reason: "expected a JSON object".to_string(),
        });
    }
    Ok(Some(value))
}
