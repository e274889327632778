//! Cached range resolutions.
//!
//! `<home>/resolutions.json` maps `name@range` to the reference it last
//! resolved to and when.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use corepack_schema::{Descriptor, Reference};
use serde::{Deserialize, Serialize};

use crate::Result;

/// A cached resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionEntry {
    /// What the range resolved to.
    pub reference: Reference,
    /// When.
    pub resolved_at: DateTime<Utc>,
}

impl ResolutionEntry {
    /// Younger than `ttl` at `now`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.resolved_at) < ttl
    }
}

type Resolutions = BTreeMap<String, ResolutionEntry>;

/// Cache key for a descriptor: `name@range`, integrity excluded.
pub fn cache_key(descriptor: &Descriptor) -> String {
    format!("{}@{}", descriptor.manager, descriptor.range)
}

/// Handle on the resolution cache file.
#[derive(Debug, Clone)]
pub struct ResolutionCache {
    path: PathBuf,
}

impl ResolutionCache {
    /// Cache backed by `path`; the file need not exist yet.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The entry for `key`. An unreadable file counts as empty.
    pub fn lookup(&self, key: &str) -> Option<ResolutionEntry> {
        let entries: Resolutions = super::load(&self.path);
        entries.get(key).cloned()
    }

    /// Store `reference` for `key`, resolved at `now`.
    pub fn record(&self, key: &str, reference: &Reference, now: DateTime<Utc>) -> Result<()> {
        let entry = ResolutionEntry {
            reference: reference.clone(),
            resolved_at: now,
        };
        super::update(&self.path, |entries: &mut Resolutions| {
            entries.insert(key.to_string(), entry);
        })
    }

    /// Drop entries older than `ttl`. Returns how many were removed.
    pub fn prune(&self, ttl: Duration, now: DateTime<Utc>) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        super::update(&self.path, |entries: &mut Resolutions| {
            let before = entries.len();
            entries.retain(|_, entry| entry.is_fresh(ttl, now));
            before - entries.len()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yarn(version: &str) -> Reference {
        Reference::Version(semver::Version::parse(version).unwrap())
    }

    #[test]
    fn test_record_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResolutionCache::new(dir.path().join("resolutions.json"));
        let now = Utc::now();

        assert_eq!(cache.lookup("yarn@^1"), None);
        cache.record("yarn@^1", &yarn("1.22.22"), now).unwrap();
        cache.record("yarn@latest", &yarn("4.6.0"), now).unwrap();

        let entry = cache.lookup("yarn@^1").unwrap();
        assert_eq!(entry.reference, yarn("1.22.22"));
        assert!(entry.is_fresh(Duration::hours(24), now + Duration::hours(1)));
        assert!(!entry.is_fresh(Duration::hours(24), now + Duration::hours(25)));
    }

    #[test]
    fn test_prune_drops_stale_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResolutionCache::new(dir.path().join("resolutions.json"));
        let now = Utc::now();

        cache.record("yarn@^1", &yarn("1.22.22"), now - Duration::hours(48)).unwrap();
        cache.record("pnpm@^9", &yarn("9.15.4"), now).unwrap();

        assert_eq!(cache.prune(Duration::hours(24), now).unwrap(), 1);
        assert_eq!(cache.lookup("yarn@^1"), None);
        assert!(cache.lookup("pnpm@^9").is_some());
    }

    #[test]
    fn test_cache_key_ignores_integrity() {
        let plain = Descriptor::parse("yarn@^1.22", "test").unwrap();
        assert_eq!(cache_key(&plain), "yarn@^1.22");
    }
}
