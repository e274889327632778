//! Descriptor resolution: turn a range or tag into exactly one locator.

use std::collections::BTreeMap;

use chrono::Utc;
use corepack_schema::{Descriptor, Locator, PackageManager, Range, Reference};
use semver::Version;
use tracing::{debug, trace};

use crate::registry::sources;
use crate::state::resolutions::{ResolutionCache, cache_key};
use crate::{Context, Error, Result};

/// Available releases of one manager, merged across its registry sources.
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    /// Published versions, in registry order.
    pub versions: Vec<Version>,
    /// Dist-tags that name a known version.
    pub tags: BTreeMap<String, Version>,
}

/// Pick the version `range` selects from `candidates`.
///
/// Tags map directly. Semver ranges pick the highest matching version; a
/// pre-release only matches when the range itself names a pre-release of
/// the same `major.minor.patch`.
pub fn select_version(range: &Range, candidates: &Candidates) -> Option<Version> {
    match range {
        Range::Exact(version) => Some(version.clone()),
        Range::Tag(tag) => candidates.tags.get(tag).cloned(),
        Range::Semver(req) => candidates
            .versions
            .iter()
            .filter(|v| req.matches(v))
            .max()
            .cloned(),
        Range::Url(_) => None,
    }
}

/// Resolve `descriptor` to a locator.
///
/// Exact versions and URLs resolve locally. Ranges and tags go through the
/// resolution cache: with the network disabled any cached answer is used,
/// otherwise only fresh ones are. A registry query refreshes the cache.
pub async fn resolve_descriptor(ctx: &Context, descriptor: &Descriptor) -> Result<Locator> {
    let manager = descriptor.manager;
    let reference = match &descriptor.range {
        Range::Exact(version) => Reference::Version(version.clone()),
        Range::Url(url) => Reference::Url(url.clone()),
        range @ (Range::Semver(_) | Range::Tag(_)) => resolve_range(ctx, descriptor, range).await?,
    };

    let locator = Locator {
        manager,
        reference,
        integrity: descriptor.integrity.clone(),
    };
    ctx.reporter.resolved(descriptor, &locator);
    Ok(locator)
}

async fn resolve_range(ctx: &Context, descriptor: &Descriptor, range: &Range) -> Result<Reference> {
    let config = &ctx.config;
    let key = cache_key(descriptor);
    let cache = ResolutionCache::new(config.resolutions_path());

    if let Some(entry) = cache.lookup(&key) {
        if !config.enable_network || entry.is_fresh(config.resolution_ttl, Utc::now()) {
            debug!("resolved {key} to {} from cache", entry.reference);
            return Ok(entry.reference);
        }
        trace!("cached resolution for {key} is stale");
    }

    if !config.enable_network {
        return Err(Error::NetworkDisabled {
            manager: descriptor.manager,
            range: range.to_string(),
        });
    }

    let candidates = fetch_candidates(ctx, descriptor.manager).await?;
    let version = select_version(range, &candidates).ok_or_else(|| Error::Resolution {
        manager: descriptor.manager,
        range: range.to_string(),
    })?;
    debug!("resolved {key} to {version} from the registry");

    let reference = Reference::Version(version);
    let to_record = reference.clone();
    tokio::task::spawn_blocking(move || cache.record(&key, &to_record, Utc::now())).await??;
    Ok(reference)
}

/// Query every registry source of `manager` and merge what they publish.
pub async fn fetch_candidates(ctx: &Context, manager: PackageManager) -> Result<Candidates> {
    let mut candidates = Candidates::default();
    for source in sources(manager) {
        let metadata = ctx.registry.package_metadata(source.package).await?;

        candidates.versions.extend(
            metadata
                .versions
                .keys()
                .filter_map(|raw| Version::parse(raw).ok())
                .filter(|v| source.admits(v)),
        );
        // Later sources win on tag clashes (`latest` of the modern yarn line).
        for (tag, raw) in metadata.dist_tags {
            if let Ok(version) = Version::parse(&raw) {
                if source.admits(&version) {
                    candidates.tags.insert(tag, version);
                }
            }
        }
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRegistry, context};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn candidates(versions: &[&str]) -> Candidates {
        Candidates {
            versions: versions.iter().map(|s| v(s)).collect(),
            tags: BTreeMap::from([("latest".to_string(), v("1.22.22"))]),
        }
    }

    fn range(raw: &str) -> Range {
        Range::parse(raw).unwrap()
    }

    #[test]
    fn test_select_highest_match_regardless_of_order() {
        let c = candidates(&["1.22.22", "1.0.0", "1.22.4", "2.4.3"]);
        assert_eq!(select_version(&range("^1.0.0"), &c), Some(v("1.22.22")));
        assert_eq!(select_version(&range("<1.22.10"), &c), Some(v("1.22.4")));
        assert_eq!(select_version(&range("latest"), &c), Some(v("1.22.22")));
        assert_eq!(select_version(&range("canary"), &c), None);
        assert_eq!(select_version(&range("^5"), &c), None);
    }

    #[test]
    fn test_prerelease_needs_explicit_opt_in() {
        let c = candidates(&["4.5.3", "4.6.0-rc.1"]);
        assert_eq!(select_version(&range("^4.5.0"), &c), Some(v("4.5.3")));
        assert_eq!(select_version(&range(">=4.6.0-rc.0"), &c), Some(v("4.6.0-rc.1")));
    }

    #[tokio::test]
    async fn test_exact_versions_never_touch_the_registry() {
        let home = tempfile::tempdir().unwrap();
        let registry = Arc::new(FakeRegistry::new());
        let ctx = context(registry.clone(), home.path());

        for raw in ["yarn@1.22.4", "pnpm@9.1.0", "npm@https://example.com/npm.tgz"] {
            let descriptor = Descriptor::parse(raw, "test").unwrap();
            let locator = resolve_descriptor(&ctx, &descriptor).await.unwrap();
            assert_eq!(locator.to_string(), raw);
        }
        assert_eq!(registry.metadata_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ranges_merge_yarn_sources_and_cache_answers() {
        let home = tempfile::tempdir().unwrap();
        let registry = Arc::new(FakeRegistry::new());
        registry.publish_versions("yarn", &["1.22.4", "1.22.22"], "1.22.22");
        registry.publish_versions("@yarnpkg/cli-dist", &["2.2.2", "4.6.0"], "4.6.0");
        let ctx = context(registry.clone(), home.path());

        let latest = Descriptor::parse("yarn@latest", "test").unwrap();
        let locator = resolve_descriptor(&ctx, &latest).await.unwrap();
        assert_eq!(locator.reference, Reference::Version(v("4.6.0")));

        let classic = Descriptor::parse("yarn@^1", "test").unwrap();
        let locator = resolve_descriptor(&ctx, &classic).await.unwrap();
        assert_eq!(locator.reference, Reference::Version(v("1.22.22")));
        let calls = registry.metadata_calls.load(Ordering::SeqCst);

        // Second lookup is served from the resolution cache.
        resolve_descriptor(&ctx, &classic).await.unwrap();
        assert_eq!(registry.metadata_calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_offline_uses_any_cached_answer_and_fails_on_miss() {
        let home = tempfile::tempdir().unwrap();
        let registry = Arc::new(FakeRegistry::new());
        let mut ctx = context(registry.clone(), home.path());

        let cache = ResolutionCache::new(ctx.config.resolutions_path());
        let old = Utc::now() - chrono::Duration::days(30);
        cache.record("pnpm@^8", &Reference::Version(v("8.15.9")), old).unwrap();

        let mut config = (*ctx.config).clone();
        config.enable_network = false;
        ctx.config = Arc::new(config);

        let cached = Descriptor::parse("pnpm@^8", "test").unwrap();
        let locator = resolve_descriptor(&ctx, &cached).await.unwrap();
        assert_eq!(locator.reference, Reference::Version(v("8.15.9")));

        let missing = Descriptor::parse("pnpm@^9", "test").unwrap();
        let err = resolve_descriptor(&ctx, &missing).await.unwrap_err();
        assert!(matches!(err, Error::NetworkDisabled { .. }));
        assert!(err.to_string().contains("COREPACK_ENABLE_NETWORK"));
        assert_eq!(registry.metadata_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsatisfiable_range() {
        let home = tempfile::tempdir().unwrap();
        let registry = Arc::new(FakeRegistry::new());
        registry.publish_versions("npm", &["10.9.2"], "10.9.2");
        let ctx = context(registry, home.path());

        let descriptor = Descriptor::parse("npm@^99", "test").unwrap();
        let err = resolve_descriptor(&ctx, &descriptor).await.unwrap_err();
        assert!(matches!(err, Error::Resolution { manager: PackageManager::Npm, .. }));
    }
}
