//! Embedded default versions.

use corepack_schema::{Descriptor, PackageManager};
use semver::Version;

/// Version used for a manager when nothing pins or activates one.
pub const fn default_version(manager: PackageManager) -> Version {
    match manager {
        PackageManager::Npm => Version::new(10, 9, 2),
        PackageManager::Yarn => Version::new(1, 22, 22),
        PackageManager::Pnpm => Version::new(9, 15, 4),
    }
}

/// Version used to run a transparent command (`yarn dlx`, `pnpm init`)
/// in a project pinned to another manager.
///
/// Yarn classic has no `dlx`, so yarn uses the modern line here.
pub const fn transparent_version(manager: PackageManager) -> Version {
    match manager {
        PackageManager::Yarn => Version::new(4, 6, 0),
        PackageManager::Npm | PackageManager::Pnpm => default_version(manager),
    }
}

/// Embedded default descriptor for `manager`.
pub fn default_descriptor(manager: PackageManager) -> Descriptor {
    Descriptor::exact(manager, default_version(manager))
}
