//! Shared operation context.
//!
//! Groups the configuration and the injected collaborators (registry
//! client, progress reporter) that every operation needs.

use std::fmt;
use std::sync::Arc;

use crate::registry::{NpmRegistry, Registry};
use crate::{Config, Reporter, Result};

/// Configuration plus the collaborators an operation talks to.
#[derive(Clone)]
pub struct Context {
    /// Paths and policy.
    pub config: Arc<Config>,
    /// Where package metadata and tarballs come from.
    pub registry: Arc<dyn Registry>,
    /// Progress sink.
    pub reporter: Arc<dyn Reporter>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Build a context around an explicit registry (tests use a mock).
    pub fn new(config: Config, registry: Arc<dyn Registry>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            reporter,
        }
    }

    /// Context talking to the configured npm registry over HTTP.
    pub fn with_npm_registry(config: Config, reporter: Arc<dyn Reporter>) -> Result<Self> {
        let registry = NpmRegistry::new(&config.registry_url)?;
        Ok(Self::new(config, Arc::new(registry), reporter))
    }
}
