//! Descriptors (`yarn@^4`) and the locators they resolve to.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::{Integrity, PackageManager, SpecError};

/// The version part of a descriptor, classified once at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Range {
    /// A single exact version (`1.22.4`). Resolves without the network.
    Exact(semver::Version),
    /// A semver range (`^1.22`, `>=2 <4`).
    Semver(SemverRange),
    /// A registry dist-tag (`latest`, `canary`).
    Tag(String),
    /// A direct tarball URL. Resolves without the network.
    Url(String),
}

impl Range {
    /// Classify a raw range string.
    ///
    /// URLs win first, then exact versions, then semver ranges; anything
    /// else is treated as a dist-tag.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::EmptyRange`] for an empty string.
    pub fn parse(raw: &str) -> Result<Self, SpecError> {
        if raw.is_empty() {
            return Err(SpecError::EmptyRange);
        }
        if raw.starts_with("https://") || raw.starts_with("http://") {
            return Ok(Self::Url(raw.to_string()));
        }
        if let Ok(version) = semver::Version::parse(raw) {
            return Ok(Self::Exact(version));
        }
        if let Some(range) = SemverRange::parse(raw) {
            return Ok(Self::Semver(range));
        }
        Ok(Self::Tag(raw.to_string()))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::Semver(range) => write!(f, "{range}"),
            Self::Tag(tag) => f.write_str(tag),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// An npm-style semver range.
///
/// npm ranges allow space-separated comparators, `||` alternatives,
/// hyphen ranges (`1.2 - 2.3`) and bare partial versions meaning
/// "any patch" (`1.2` is `1.2.x`). Each alternative is normalised into a
/// [`semver::VersionReq`], whose pre-release rule (a pre-release only
/// matches a comparator naming a pre-release on the same
/// `major.minor.patch`) is the one npm uses.
#[derive(Debug, Clone)]
pub struct SemverRange {
    raw: String,
    alternatives: Vec<semver::VersionReq>,
}

impl SemverRange {
    /// Parse an npm range, or `None` if it is not one.
    pub fn parse(raw: &str) -> Option<Self> {
        let alternatives = raw
            .split("||")
            .map(|alt| semver::VersionReq::parse(&normalize_alternative(alt)).ok())
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }

    /// Whether `version` satisfies any alternative of the range.
    pub fn matches(&self, version: &semver::Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

fn normalize_alternative(alt: &str) -> String {
    let alt = alt.trim();
    if alt.is_empty() {
        return "*".to_string();
    }
    if let Some((lo, hi)) = alt.split_once(" - ") {
        return format!(">={}, <={}", lo.trim(), hi.trim());
    }

    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for token in alt.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(token);
            continue;
        }
        let token = format!("{pending_op}{token}");
        pending_op.clear();
        // A bare partial is an exact prefix in npm but a caret in cargo.
        let bare = token.starts_with(|c: char| c.is_ascii_digit())
            && !token.contains(['x', 'X', '*']);
        comparators.push(if bare { format!("={token}") } else { token });
    }
    comparators.join(", ")
}

impl PartialEq for SemverRange {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for SemverRange {}

impl fmt::Display for SemverRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// An unresolved request for a package manager: `name@range[+integrity]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Requested manager.
    pub manager: PackageManager,
    /// Requested version, range, tag or URL.
    pub range: Range,
    /// Expected archive digest, when the descriptor pins one.
    pub integrity: Option<Integrity>,
}

impl Descriptor {
    /// Build a descriptor pinned to an exact version.
    pub fn exact(manager: PackageManager, version: semver::Version) -> Self {
        Self {
            manager,
            range: Range::Exact(version),
            integrity: None,
        }
    }

    /// Parse a descriptor string such as `yarn@1.22.4` or
    /// `pnpm@9.1.0+sha224.<hex>`.
    ///
    /// `source` names where the string came from (a manifest path, "CLI
    /// arguments") and only shows up in error messages.
    ///
    /// A `+` suffix is read as an integrity value only when it looks like
    /// one (`sha…` followed by a dot); otherwise it stays part of the range,
    /// so semver build metadata such as `1.0.0+build.5` survives.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Malformed`] wrapping the underlying reason when
    /// the separator is missing, the name is not a supported manager, the
    /// range is empty, or the integrity suffix is invalid.
    pub fn parse(raw: &str, source: &str) -> Result<Self, SpecError> {
        Self::parse_inner(raw.trim()).map_err(|reason| SpecError::Malformed {
            raw: raw.to_string(),
            source_name: source.to_string(),
            reason: Box::new(reason),
        })
    }

    fn parse_inner(raw: &str) -> Result<Self, SpecError> {
        let (name, rest) = raw.split_once('@').ok_or(SpecError::MissingSeparator)?;
        let manager: PackageManager = name.parse()?;

        let (range, integrity) = match rest.rsplit_once('+') {
            Some((range, suffix)) if looks_like_integrity(suffix) => {
                (range, Some(Integrity::parse_suffix(suffix)?))
            }
            _ => (rest, None),
        };

        Ok(Self {
            manager,
            range: Range::parse(range)?,
            integrity,
        })
    }
}

fn looks_like_integrity(suffix: &str) -> bool {
    suffix.starts_with("sha") && suffix.contains('.')
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.manager, self.range)?;
        if let Some(integrity) = &self.integrity {
            write!(f, "+{integrity}")?;
        }
        Ok(())
    }
}

impl From<&Locator> for Descriptor {
    fn from(locator: &Locator) -> Self {
        let range = match &locator.reference {
            Reference::Version(v) => Range::Exact(v.clone()),
            Reference::Url(url) => Range::Url(url.clone()),
        };
        Self {
            manager: locator.manager,
            range,
            integrity: locator.integrity.clone(),
        }
    }
}

/// What a locator points at: an exact registry version or a tarball URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// An exact version published to the registry.
    Version(semver::Version),
    /// A tarball downloaded from a URL.
    Url(String),
}

impl Reference {
    /// Directory name for this reference inside `<cacheRoot>/<name>/`.
    ///
    /// Versions are used verbatim. URLs are not path-safe, so they map to
    /// `url-` followed by the first 16 hex chars of their SHA-256.
    pub fn dir_name(&self) -> String {
        match self {
            Self::Version(v) => v.to_string(),
            Self::Url(url) => {
                let digest = hex::encode(Sha256::digest(url.as_bytes()));
                format!("url-{}", &digest[..16])
            }
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(v) => write!(f, "{v}"),
            Self::Url(url) => f.write_str(url),
        }
    }
}

impl FromStr for Reference {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Range::parse(s)? {
            Range::Exact(v) => Ok(Self::Version(v)),
            Range::Url(url) => Ok(Self::Url(url)),
            Range::Semver(_) | Range::Tag(_) => Err(SpecError::InvalidReference(s.to_string())),
        }
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A descriptor resolved to exactly one installable reference.
///
/// `(manager, reference)` is the install cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    /// The manager this locator installs.
    pub manager: PackageManager,
    /// The concrete version or URL.
    pub reference: Reference,
    /// Digest carried over from the descriptor, checked at install time.
    pub integrity: Option<Integrity>,
}

impl Locator {
    /// Build a locator for an exact registry version.
    pub fn version(manager: PackageManager, version: semver::Version) -> Self {
        Self {
            manager,
            reference: Reference::Version(version),
            integrity: None,
        }
    }

    /// Attach an expected integrity value.
    pub fn with_integrity(mut self, integrity: Option<Integrity>) -> Self {
        self.integrity = integrity;
        self
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.manager, self.reference)
    }
}
