//! npm registry client.
//!
//! The resolver and the install cache only see the [`Registry`] trait; the
//! HTTP implementation is [`NpmRegistry`].

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use corepack_schema::PackageManager;
use reqwest::Client;
use semver::Version;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Abbreviated-metadata media type; much smaller than the full document.
const ABBREVIATED_METADATA: &str = "application/vnd.npm.install-v1+json";

/// Registry transport and lookup failures.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Connection or decoding failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    /// A non-success status.
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// 404 on a metadata document.
    #[error("package {0} not found in the registry")]
    NotFound(String),
}

/// The subset of a registry packument corepack reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageMetadata {
    /// Tag name to version string (`latest`, `next`, ...).
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: BTreeMap<String, String>,
    /// Every published version.
    #[serde(default)]
    pub versions: BTreeMap<String, VersionMetadata>,
}

/// One published version.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionMetadata {
    /// Its tarball.
    pub dist: Dist,
}

/// Where a published version's tarball lives and what it should hash to.
#[derive(Debug, Clone, Deserialize)]
pub struct Dist {
    /// Absolute tarball URL.
    pub tarball: String,
    /// Subresource Integrity string (`sha512-<base64>`).
    #[serde(default)]
    pub integrity: Option<String>,
}

/// Source of package metadata and tarballs.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetch the metadata document for `package`.
    async fn package_metadata(&self, package: &str) -> Result<PackageMetadata, RegistryError>;

    /// Download a tarball.
    async fn fetch(&self, url: &str) -> Result<Bytes, RegistryError>;
}

/// A registry package that publishes releases of a manager, limited to the
/// major versions it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySource {
    /// Registry package name.
    pub package: &'static str,
    /// Inclusive lower bound.
    pub min_major: u64,
    /// Exclusive upper bound.
    pub max_major: Option<u64>,
}

impl RegistrySource {
    /// Whether `version` is published by this package.
    pub fn admits(&self, version: &Version) -> bool {
        version.major >= self.min_major && self.max_major.is_none_or(|max| version.major < max)
    }
}

/// Registry packages that publish `manager`.
///
/// Yarn moved packages at 2.0: classic releases live under `yarn`, the
/// modern line under `@yarnpkg/cli-dist`.
pub fn sources(manager: PackageManager) -> &'static [RegistrySource] {
    const NPM: &[RegistrySource] = &[RegistrySource {
        package: "npm",
        min_major: 0,
        max_major: None,
    }];
    const YARN: &[RegistrySource] = &[
        RegistrySource {
            package: "yarn",
            min_major: 0,
            max_major: Some(2),
        },
        RegistrySource {
            package: "@yarnpkg/cli-dist",
            min_major: 2,
            max_major: None,
        },
    ];
    const PNPM: &[RegistrySource] = &[RegistrySource {
        package: "pnpm",
        min_major: 0,
        max_major: None,
    }];

    match manager {
        PackageManager::Npm => NPM,
        PackageManager::Yarn => YARN,
        PackageManager::Pnpm => PNPM,
    }
}

/// The source that publishes `version` of `manager`.
pub fn source_for(manager: PackageManager, version: &Version) -> &'static RegistrySource {
    let all = sources(manager);
    all.iter()
        .find(|source| source.admits(version))
        .unwrap_or(&all[0])
}

/// HTTP client for an npm-compatible registry.
pub struct NpmRegistry {
    client: Client,
    base_url: String,
}

impl fmt::Debug for NpmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NpmRegistry")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl NpmRegistry {
    /// Client for the registry at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, RegistryError> {
        let client = Client::builder().user_agent(crate::USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn metadata_url(&self, package: &str) -> String {
        // Scoped names keep their `@` but escape the slash.
        format!("{}/{}", self.base_url, package.replace('/', "%2f"))
    }
}

#[async_trait]
impl Registry for NpmRegistry {
    async fn package_metadata(&self, package: &str) -> Result<PackageMetadata, RegistryError> {
        let url = self.metadata_url(package);
        debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, ABBREVIATED_METADATA)
            .send()
            .await?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Err(RegistryError::NotFound(package.to_string())),
            status if !status.is_success() => Err(RegistryError::Status {
                url,
                status: status.as_u16(),
            }),
            _ => Ok(response.json().await?),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, RegistryError> {
        debug!("GET {url}");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?)
    }
}
