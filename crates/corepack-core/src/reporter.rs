//! Reporter trait for dependency injection
//!
//! Core operations report progress through this trait so they stay
//! independent of how (or whether) the CLI renders it.

use corepack_schema::{Descriptor, Locator};

use crate::InstallRecord;

/// Progress sink for core operations.
pub trait Reporter: Send + Sync {
    /// A descriptor was resolved to a concrete locator.
    fn resolved(&self, descriptor: &Descriptor, locator: &Locator);

    /// An archive download started.
    fn downloading(&self, locator: &Locator, url: &str);

    /// A locator is now installed and complete.
    fn installed(&self, record: &InstallRecord);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn resolved(&self, descriptor: &Descriptor, locator: &Locator) {
        (**self).resolved(descriptor, locator);
    }
    fn downloading(&self, locator: &Locator, url: &str) {
        (**self).downloading(locator, url);
    }
    fn installed(&self, record: &InstallRecord) {
        (**self).installed(record);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// A no-op reporter for silent operations (e.g., `--quiet`, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn resolved(&self, _: &Descriptor, _: &Locator) {}
    fn downloading(&self, _: &Locator, _: &str) {}
    fn installed(&self, _: &InstallRecord) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}
