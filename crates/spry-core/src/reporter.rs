//! Reporter trait for dependency injection
//!
//! This trait allows core logic to report progress and status without
//! being coupled to a specific terminal implementation.

use semver::Version;
use spry_schema::PackageName;

pub trait Reporter: Send + Sync {
    /// Announces the artifact chosen for a package.
    fn resolved(&self, name: &PackageName, version: &Version, platform: &str, url: &str);

    /// Updates the progress of a download.
    fn downloading(&self, name: &PackageName, version: &Version, current: u64, total: Option<u64>);

    /// Updates the state of a package to 'installing'.
    fn installing(&self, name: &PackageName, version: &Version);

    /// Updates the state of a package to 'verifying'.
    fn verifying(&self, name: &PackageName, version: &Version);

    /// Marks a package operation as successfully completed.
    fn done(&self, name: &PackageName, version: &Version, detail: &str);

    /// Marks a package operation as failed with a specific reason.
    fn failed(&self, name: &PackageName, version: &Version, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn resolved(&self, name: &PackageName, version: &Version, platform: &str, url: &str) {
        (**self).resolved(name, version, platform, url);
    }
    fn downloading(&self, name: &PackageName, version: &Version, current: u64, total: Option<u64>) {
        (**self).downloading(name, version, current, total);
    }
    fn installing(&self, name: &PackageName, version: &Version) {
        (**self).installing(name, version);
    }
    fn verifying(&self, name: &PackageName, version: &Version) {
        (**self).verifying(name, version);
    }
    fn done(&self, name: &PackageName, version: &Version, detail: &str) {
        (**self).done(name, version, detail);
    }
    fn failed(&self, name: &PackageName, version: &Version, reason: &str) {
        (**self).failed(name, version, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// A no-op reporter for silent operations (e.g., verification, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn resolved(&self, _: &PackageName, _: &Version, _: &str, _: &str) {}
    fn downloading(&self, _: &PackageName, _: &Version, _: u64, _: Option<u64>) {}
    fn installing(&self, _: &PackageName, _: &Version) {}
    fn verifying(&self, _: &PackageName, _: &Version) {}
    fn done(&self, _: &PackageName, _: &Version, _: &str) {}
    fn failed(&self, _: &PackageName, _: &Version, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}
