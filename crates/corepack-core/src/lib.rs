//! Core of corepack: finding the package manager a project pins, resolving
//! it against the npm registry, installing it into the cache and running it.

pub mod archive;
pub mod clean;
pub mod config;
pub mod context;
pub mod defaults;
pub mod dispatch;
pub mod error;
pub mod install;
pub mod io;
pub mod manifest;
pub mod prepare;
pub mod registry;
pub mod reporter;
pub mod resolver;
pub mod shims;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use context::Context;
pub use error::{Error, Result};
pub use install::InstallRecord;
pub use reporter::{NullReporter, Reporter};

/// User Agent string for registry requests
pub const USER_AGENT: &str = concat!("corepack/", env!("CARGO_PKG_VERSION"));
