//! Runtime configuration and on-disk layout.
//!
//! Everything lives under a single cache root (`COREPACK_HOME`), shared by
//! every corepack process on the machine.

use std::path::PathBuf;

use corepack_schema::{Locator, PackageManager};

use crate::{Error, Result};

/// Default npm registry.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// How long a range resolution stays fresh while the network is available.
pub const DEFAULT_RESOLUTION_TTL_HOURS: i64 = 24;

const TMP_DIR: &str = ".tmp";
const LOCKS_DIR: &str = ".locks";
const LAST_KNOWN_GOOD: &str = "lastKnownGood.json";
const RESOLUTIONS: &str = "resolutions.json";

/// Settings read once from the environment at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    /// The cache root.
    pub home: PathBuf,
    /// `false` when `COREPACK_ENABLE_NETWORK=0`.
    pub enable_network: bool,
    /// Registry base URL, without a trailing slash.
    pub registry_url: String,
    /// `false` when `COREPACK_ENABLE_STRICT=0`.
    pub strict: bool,
    /// Freshness window for cached range resolutions.
    pub resolution_ttl: chrono::Duration,
}

impl Config {
    /// Defaults rooted at `home`, with the network enabled.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            enable_network: true,
            registry_url: DEFAULT_REGISTRY.to_string(),
            strict: true,
            resolution_ttl: chrono::Duration::hours(DEFAULT_RESOLUTION_TTL_HOURS),
        }
    }

    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home = match var("COREPACK_HOME").filter(|v| !v.is_empty()) {
            Some(home) => PathBuf::from(home),
            None => dirs::cache_dir()
                .map(|dir| dir.join("node").join("corepack"))
                .ok_or_else(|| {
                    Error::Usage(
                        "could not determine a cache directory; set COREPACK_HOME".to_string(),
                    )
                })?,
        };

        let mut config = Self::new(home);
        config.enable_network = var("COREPACK_ENABLE_NETWORK").as_deref() != Some("0");
        config.strict = var("COREPACK_ENABLE_STRICT").as_deref() != Some("0");
        if let Some(url) = var("COREPACK_NPM_REGISTRY").filter(|v| !v.is_empty()) {
            config.registry_url = url.trim_end_matches('/').to_string();
        }
        Ok(config)
    }

    /// `<home>/<name>/<reference>`
    pub fn install_dir(&self, locator: &Locator) -> PathBuf {
        self.manager_dir(locator.manager)
            .join(locator.reference.dir_name())
    }

    /// `<home>/<name>`
    pub fn manager_dir(&self, manager: PackageManager) -> PathBuf {
        self.home.join(manager.as_str())
    }

    /// Per-cache-key install lock.
    pub fn install_lock_path(&self, locator: &Locator) -> PathBuf {
        self.home
            .join(LOCKS_DIR)
            .join(locator.manager.as_str())
            .join(format!("{}.lock", locator.reference.dir_name()))
    }

    /// Staging area, on the same volume as the installs so renames are atomic.
    pub fn tmp_dir(&self) -> PathBuf {
        self.home.join(TMP_DIR)
    }

    /// Per-manager activated versions.
    pub fn last_known_good_path(&self) -> PathBuf {
        self.home.join(LAST_KNOWN_GOOD)
    }

    /// Cached range resolutions.
    pub fn resolutions_path(&self) -> PathBuf {
        self.home.join(RESOLUTIONS)
    }
}
