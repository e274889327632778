//! Run a package manager on behalf of a shim or `corepack <binary>`.

use std::ffi::OsString;

use anyhow::{Context as _, Result};
use corepack_core::Context;
use corepack_core::dispatch::{Invocation, run};
use corepack_schema::{Binary, Descriptor};

/// Dispatch `binary` with `args` from the current directory and return the
/// child's exit code.
pub async fn dispatch(
    ctx: &Context,
    binary: Binary,
    explicit: Option<&str>,
    args: Vec<OsString>,
) -> Result<i32> {
    let explicit = explicit
        .map(|raw| Descriptor::parse(raw, "CLI arguments"))
        .transpose()?;
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;

    let code = run(
        ctx,
        Invocation {
            binary,
            explicit,
            args,
            cwd,
        },
    )
    .await?;
    Ok(code)
}
