//! Domain errors for corepack operations

use std::path::{Path, PathBuf};

use corepack_schema::{Binary, PackageManager, SpecError};
use thiserror::Error;

use crate::registry::RegistryError;

/// Everything a corepack operation can fail with.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad command-line usage.
    #[error("{0}")]
    Usage(String),

    #[error("no package.json found in {} or any parent directory", cwd.display())]
    /// No manifest found while walking up.
    NoProject {
        /// Where the walk started.
        cwd: PathBuf,
    },

    #[error("{} has no \"packageManager\" field", manifest.display())]
    /// Manifests exist but none pins a package manager.
    NoSpec {
        /// The nearest manifest.
        manifest: PathBuf,
    },

    /// An unparseable descriptor.
    #[error(transparent)]
    MalformedSpec(#[from] SpecError),

    #[error("invalid manifest {}: {reason}", path.display())]
    /// A manifest that is not valid JSON or has a non-string field.
    Manifest {
        /// The manifest.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// Nothing published satisfies the range.
    #[error("no {manager} version matches '{range}'")]
    Resolution {
        /// Manager being resolved.
        manager: PackageManager,
        /// The range as written.
        range: String,
    },

    /// The cache cannot answer and the network is off.
    #[error(
        "{manager}@{range} is not available in the local cache and network access is disabled (COREPACK_ENABLE_NETWORK=0)"
    )]
    NetworkDisabled {
        /// Manager being resolved.
        manager: PackageManager,
        /// The range as written.
        range: String,
    },

    /// Downloaded or imported bytes do not hash to the expected value.
    #[error("integrity check failed for {subject}: expected {expected}, got {actual}")]
    Integrity {
        /// What was checked (a locator or an archive entry).
        subject: String,
        /// Expected integrity.
        expected: String,
        /// Computed integrity.
        actual: String,
    },

    /// Strict mode refused a binary of another manager than the pinned one.
    #[error(
        "this project is configured to use {pinned} because {} has a \"packageManager\" field; refusing to run {invoked} (set COREPACK_ENABLE_STRICT=0 to override)",
        manifest.display()
    )]
    WrongPackageManager {
        /// The binary that was run.
        invoked: Binary,
        /// The manager the project pins.
        pinned: PackageManager,
        /// The manifest that pins it.
        manifest: PathBuf,
    },

    #[error("failed to run {program}: {reason}")]
    /// The package manager could not be spawned.
    Execution {
        /// Entry point that failed.
        program: String,
        /// Why.
        reason: String,
    },

    /// Talking to the registry failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Filesystem failure.
    #[error("{}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A malformed tarball or offline archive.
    #[error("archive error: {0}")]
    Archive(String),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

/// Result alias defaulting to [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Attach a path to `std::io` results.
pub trait IoContext<T> {
    /// Map the error to [`Error::Io`] at `path`.
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
