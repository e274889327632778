//! The supported package managers and the binaries they ship.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::SpecError;

/// One of the package managers corepack knows how to provision.
///
/// The set is closed: adding a manager means adding a variant here and
/// handling it everywhere the compiler points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    /// The npm CLI (`npm`, `npx`).
    Npm,
    /// Yarn, both the classic 1.x line and the 2+ line (`yarn`, `yarnpkg`).
    Yarn,
    /// pnpm (`pnpm`, `pnpx`).
    Pnpm,
}

impl PackageManager {
    /// Every supported manager, in a stable order.
    pub const ALL: [Self; 3] = [Self::Npm, Self::Yarn, Self::Pnpm];

    /// Return the manager name as used in descriptors and on disk.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }

    /// Binaries provided by this manager.
    pub fn binaries(self) -> &'static [Binary] {
        match self {
            Self::Npm => &[Binary::Npm, Binary::Npx],
            Self::Yarn => &[Binary::Yarn, Binary::Yarnpkg],
            Self::Pnpm => &[Binary::Pnpm, Binary::Pnpx],
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageManager {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "npm" => Ok(Self::Npm),
            "yarn" => Ok(Self::Yarn),
            "pnpm" => Ok(Self::Pnpm),
            other => Err(SpecError::UnknownManager(other.to_string())),
        }
    }
}

/// An executable name a user can invoke through a corepack shim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binary {
    /// `npm`
    Npm,
    /// `npx`
    Npx,
    /// `yarn`
    Yarn,
    /// `yarnpkg`, an alias of `yarn`.
    Yarnpkg,
    /// `pnpm`
    Pnpm,
    /// `pnpx`
    Pnpx,
}

impl Binary {
    /// Every shim binary, in a stable order.
    pub const ALL: [Self; 6] = [
        Self::Npm,
        Self::Npx,
        Self::Yarn,
        Self::Yarnpkg,
        Self::Pnpm,
        Self::Pnpx,
    ];

    /// Return the executable name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Npx => "npx",
            Self::Yarn => "yarn",
            Self::Yarnpkg => "yarnpkg",
            Self::Pnpm => "pnpm",
            Self::Pnpx => "pnpx",
        }
    }

    /// The manager that ships this binary.
    pub fn manager(self) -> PackageManager {
        match self {
            Self::Npm | Self::Npx => PackageManager::Npm,
            Self::Yarn | Self::Yarnpkg => PackageManager::Yarn,
            Self::Pnpm | Self::Pnpx => PackageManager::Pnpm,
        }
    }

    /// Whether `args` (the arguments after the binary name) form a command
    /// that any manager may run, regardless of the project's pinned manager.
    ///
    /// These are commands that operate outside of a project's install state:
    /// scaffolding a new project and one-off package execution.
    pub fn is_transparent(self, args: &[&str]) -> bool {
        let subcommand = args.first().copied();
        match self {
            Self::Npx | Self::Pnpx => true,
            Self::Npm => subcommand == Some("init"),
            Self::Yarn | Self::Yarnpkg | Self::Pnpm => {
                matches!(subcommand, Some("init" | "dlx"))
            }
        }
    }
}

impl fmt::Display for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Binary {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| SpecError::UnknownManager(s.to_string()))
    }
}
