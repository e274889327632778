//! Shared types for corepack: the package-manager catalogue, descriptors,
//! locators and integrity values.

pub mod descriptor;
pub mod integrity;
pub mod manager;

// Re-exports
pub use descriptor::{Descriptor, Locator, Range, Reference, SemverRange};
pub use integrity::{HashAlgorithm, Integrity, IntegrityMismatch};
pub use manager::{Binary, PackageManager};

/// Name of the install marker written inside every complete install
/// directory. An install without it is treated as partial.
pub const INSTALL_MARKER: &str = ".corepack.json";

/// Errors produced while parsing descriptors and related values.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// The string has no `@` between name and range.
    #[error("expected <name>@<range>")]
    MissingSeparator,

    /// The name is not npm, yarn or pnpm.
    #[error("unsupported package manager '{0}' (expected npm, yarn or pnpm)")]
    UnknownManager(String),

    /// Nothing follows the `@`.
    #[error("empty version range")]
    EmptyRange,

    /// An integrity value that does not parse.
    #[error("invalid integrity: {0}")]
    InvalidIntegrity(String),

    /// A locator reference that is neither a version nor a URL.
    #[error("'{0}' is not an exact version or URL")]
    InvalidReference(String),

    /// Any of the above, with the offending string and where it came from.
    #[error("invalid package manager specification '{raw}' in {source_name}: {reason}")]
    Malformed {
        /// The descriptor as written.
        raw: String,
        /// Where it was read from (a manifest path, "CLI arguments").
        source_name: String,
        /// The underlying parse error.
        reason: Box<SpecError>,
    },
}
