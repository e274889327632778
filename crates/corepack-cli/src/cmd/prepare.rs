//! Prepare command

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use corepack_core::Context;
use corepack_core::prepare::{PrepareOptions, prepare as prepare_managers};
use corepack_schema::Descriptor;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Report<'a> {
    installs: Vec<InstallEntry<'a>>,
    output: Option<&'a Path>,
}

#[derive(Debug, Serialize)]
struct InstallEntry<'a> {
    name: &'static str,
    reference: String,
    location: &'a Path,
    hash: String,
}

/// `corepack prepare`: install, optionally activate and pack, then report
/// what was installed (as JSON with `--json`).
pub async fn prepare(
    ctx: &Context,
    descriptor: Option<&str>,
    all: bool,
    activate: bool,
    output: Option<Option<PathBuf>>,
    json: bool,
) -> Result<()> {
    let descriptor = descriptor
        .map(|raw| Descriptor::parse(raw, "CLI arguments"))
        .transpose()?;
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;

    let outcome = prepare_managers(
        ctx,
        PrepareOptions {
            descriptor,
            all,
            activate,
            output,
            cwd,
        },
    )
    .await?;

    if json {
        let report = Report {
            installs: outcome
                .installs
                .iter()
                .map(|record| InstallEntry {
                    name: record.locator.manager.as_str(),
                    reference: record.locator.reference.to_string(),
                    location: &record.location,
                    hash: record.hash.to_string(),
                })
                .collect(),
            output: outcome.output.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for record in &outcome.installs {
        println!("Prepared {}", record.locator);
    }
    Ok(())
}
