//! Garbage collection of the cache root.

use std::fs;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::IoContext;
use crate::state::resolutions::ResolutionCache;
use crate::{Config, Result};

/// Staging directories younger than this may belong to a running install.
pub const STALE_TMP_AGE: Duration = Duration::from_secs(60 * 60);

/// What a [`clean`] pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Orphaned staging directories deleted.
    pub tmp_removed: usize,
    /// Resolution cache entries dropped.
    pub resolutions_pruned: usize,
}

/// Remove orphaned staging directories and stale resolutions.
pub fn clean(config: &Config) -> Result<CleanReport> {
    clean_at(config, SystemTime::now())
}

fn clean_at(config: &Config, now: SystemTime) -> Result<CleanReport> {
    let mut report = CleanReport::default();

    let tmp = config.tmp_dir();
    if tmp.is_dir() {
        for entry in fs::read_dir(&tmp).at(&tmp)? {
            let entry = entry.at(&tmp)?;
            let path = entry.path();
            let modified = entry.metadata().and_then(|m| m.modified()).at(&path)?;
            let age = now.duration_since(modified).unwrap_or_default();
            if age < STALE_TMP_AGE {
                continue;
            }

            let removed = if entry.file_type().at(&path)?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match removed {
                Ok(()) => {
                    debug!("removed {}", path.display());
                    report.tmp_removed += 1;
                }
                Err(e) => warn!("Could not remove {}: {e}", path.display()),
            }
        }
    }

    let cache = ResolutionCache::new(config.resolutions_path());
    report.resolutions_pruned = cache.prune(config.resolution_ttl, Utc::now())?;

    Ok(report)
}
