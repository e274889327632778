//! corepack - run the package manager a project pins
#![allow(clippy::doc_markdown)]
//!
//! `corepack` is reached two ways: as itself (`corepack prepare ...`,
//! `corepack yarn@2.2.2 install`), or through a shim named after one of the
//! managed binaries (`yarn`, `pnpm`, ...), in which case every argument
//! belongs to the package manager.

pub mod cmd;
pub mod ui;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use corepack_schema::Binary;

/// Command-line arguments when corepack is invoked as itself.
#[derive(Debug, Parser)]
#[command(name = "corepack")]
#[command(author, version, about = "corepack - run the package manager a project pins")]
pub struct Cli {
    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// What to do
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve and install a package manager ahead of time
    Prepare {
        /// Package manager to prepare, e.g. yarn@2.2.2 (defaults to the project's)
        descriptor: Option<String>,
        /// Make the prepared version the default outside of projects
        #[arg(long)]
        activate: bool,
        /// Prepare the default version of every package manager
        #[arg(long)]
        all: bool,
        /// Also pack the install into an archive (optionally at PATH)
        #[arg(short, long, value_name = "PATH", num_args = 0..=1, require_equals = true)]
        output: Option<Option<PathBuf>>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import an archive created by `prepare --output`
    Hydrate {
        /// Archive to import
        archive: PathBuf,
        /// Also make the imported versions the defaults
        #[arg(long)]
        activate: bool,
    },
    /// Add package manager shims next to corepack
    Enable {
        /// Where to write the shims
        #[arg(long, value_name = "DIR")]
        install_directory: Option<PathBuf>,
        /// Package managers to enable (all when omitted)
        names: Vec<String>,
    },
    /// Remove shims created by `enable`
    Disable {
        /// Where the shims live
        #[arg(long, value_name = "DIR")]
        install_directory: Option<PathBuf>,
        /// Package managers to disable (all when omitted)
        names: Vec<String>,
    },
    /// Remove leftovers of interrupted installs and stale resolutions
    Clean,
}

/// The binary a shim was started as, from `argv[0]`.
pub fn shim_binary(argv0: &Path) -> Option<Binary> {
    argv0.file_stem()?.to_str()?.parse().ok()
}

/// Split a `corepack <binary>[@range]` argument.
///
/// Returns the binary and, when a range is given, the descriptor string for
/// the binary's manager.
pub fn dispatch_target(arg: &str) -> Option<(Binary, Option<String>)> {
    let (name, range) = match arg.split_once('@') {
        Some((name, range)) => (name, Some(range)),
        None => (arg, None),
    };
    let binary: Binary = name.parse().ok()?;
    let descriptor = range.map(|range| format!("{}@{range}", binary.manager()));
    Some((binary, descriptor))
}
