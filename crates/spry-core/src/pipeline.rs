//! Install pipeline: catalog lookup, resolve, fetch & verify, place, probe.
//!
//! One package runs its stages sequentially. Several packages run
//! concurrently, bounded by `jobs`; each run owns its scratch directories and
//! runs that hit the same target path are serialized by the installer.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use semver::Version;
use spry_schema::{ArtifactEntry, Host, PackageDescriptor, PackageName};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{InstallError, PackageFailure};
use crate::install::Installer;
use crate::io::download::{DownloadRequest, Fetcher};
use crate::reporter::Reporter;
use crate::{probe, resolver};

/// Outcome of a successful install.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub package: PackageName,
    pub version: Version,
    /// `os/arch` of the artifact row that was chosen.
    pub platform: String,
    /// URL the artifact was actually fetched from.
    pub url: String,
    pub path: PathBuf,
    /// Whether an earlier binary at `path` was replaced.
    pub replaced: bool,
    pub verification: Verification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Probe exited 0; holds its first output line.
    Passed(String),
    /// Probe ran but failed. The binary is kept.
    Failed(String),
}

impl Verification {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed(_))
    }
}

/// What an install would do, without side effects.
#[derive(Debug, Clone)]
pub struct Plan<'a> {
    pub descriptor: &'a PackageDescriptor,
    pub entry: &'a ArtifactEntry,
    pub target: PathBuf,
}

pub struct Pipeline {
    catalog: Catalog,
    fetcher: Fetcher,
    installer: Installer,
    host: Host,
    probe_timeout: Duration,
    jobs: usize,
    reporter: Arc<dyn Reporter>,
}

impl Pipeline {
    /// Assemble a pipeline for the detected host from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Config`] if the HTTP client cannot be built.
    pub fn new(
        catalog: Catalog,
        config: &Config,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self, InstallError> {
        Ok(Self {
            catalog,
            fetcher: Fetcher::from_config(config)?,
            installer: Installer::new(&config.bin_dir),
            host: Host::detect(),
            probe_timeout: config.probe_timeout(),
            jobs: config.jobs.max(1),
            reporter,
        })
    }

    #[must_use]
    pub fn with_host(mut self, host: Host) -> Self {
        self.host = host;
        self
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    #[must_use]
    pub fn with_installer(mut self, installer: Installer) -> Self {
        self.installer = installer;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    /// Look up and resolve a package without touching network or disk.
    ///
    /// # Errors
    ///
    /// Unknown package or no artifact for the host.
    pub fn plan(&self, name: &str) -> Result<Plan<'_>, PackageFailure> {
        let descriptor = self
            .catalog
            .lookup(name)
            .map_err(|e| PackageFailure::new(name, e))?;
        let entry = resolver::resolve(&descriptor.artifacts, &self.host)
            .map_err(|e| PackageFailure::new(descriptor.name.clone(), e))?;
        Ok(Plan {
            descriptor,
            entry,
            target: self.installer.target_path(entry),
        })
    }

    /// Run every stage for one package.
    ///
    /// # Errors
    ///
    /// Any fatal [`InstallError`], tagged with the package name. A failing
    /// probe is not an error: it is reported in
    /// [`InstallReport::verification`].
    pub async fn install_package(&self, name: &str) -> Result<InstallReport, PackageFailure> {
        let plan = self.plan(name)?;
        let descriptor = plan.descriptor;

        self.run(&plan).await.map_err(|e| {
            self.reporter
                .failed(&descriptor.name, &descriptor.version, &e.to_string());
            PackageFailure::new(descriptor.name.clone(), e)
        })
    }

    async fn run(&self, plan: &Plan<'_>) -> Result<InstallReport, InstallError> {
        let Plan {
            descriptor, entry, ..
        } = *plan;
        let name = &descriptor.name;
        let version = &descriptor.version;
        let platform = entry.platform();

        info!(package = %name, %version, %platform, url = %entry.url, "resolved");
        self.reporter.resolved(name, version, &platform, &entry.url);

        let artifact = self
            .fetcher
            .fetch_and_verify(&DownloadRequest {
                pkg_name: name,
                version,
                entry,
                reporter: &*self.reporter,
            })
            .await?;

        self.reporter.installing(name, version);
        let installed = self.installer.install(artifact.path(), entry).await?;
        let url = artifact.url().to_string();
        drop(artifact);

        self.reporter.verifying(name, version);
        let verification =
            match probe::verify_async(installed.path(), &descriptor.probe, self.probe_timeout)
                .await
            {
                Ok(banner) => Verification::Passed(banner),
                Err(e) if !e.is_fatal() => {
                    warn!(package = %name, error = %e, "verification failed, keeping binary");
                    self.reporter
                        .warning(&format!("{name}: installed but verification failed: {e}"));
                    Verification::Failed(e.to_string())
                }
                Err(e) => {
                    if let Err(rollback) = installed.rollback() {
                        warn!(package = %name, error = %rollback, "rollback failed");
                    }
                    return Err(e);
                }
            };

        let path = installed.path().to_path_buf();
        let replaced = installed.replaced();
        installed.commit();

        let detail = match &verification {
            Verification::Passed(banner) if !banner.is_empty() => banner.clone(),
            Verification::Passed(_) => path.display().to_string(),
            Verification::Failed(_) => "unverified".to_string(),
        };
        self.reporter.done(name, version, &detail);

        Ok(InstallReport {
            package: name.clone(),
            version: version.clone(),
            platform,
            url,
            path,
            replaced,
            verification,
        })
    }

    /// Install several packages concurrently, at most `jobs` at a time.
    ///
    /// Results come back in request order; repeated names run once.
    pub async fn install_many<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Vec<Result<InstallReport, PackageFailure>> {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|n| seen.insert(PackageName::new(n)))
            .collect();

        let mut results: Vec<(usize, Result<InstallReport, PackageFailure>)> =
            stream::iter(unique.into_iter().enumerate())
                .map(|(i, name)| async move { (i, self.install_package(name).await) })
                .buffer_unordered(self.jobs)
                .collect()
                .await;

        results.sort_by_key(|(i, _)| *i);
        results.into_iter().map(|(_, r)| r).collect()
    }

    /// Probe an already installed binary.
    ///
    /// # Errors
    ///
    /// Lookup and resolve errors, [`InstallError::VerificationFailed`] or
    /// [`InstallError::ExecutionError`] (e.g. the binary is not installed).
    pub async fn verify_package(&self, name: &str) -> Result<String, PackageFailure> {
        let plan = self.plan(name)?;
        let descriptor = plan.descriptor;

        self.reporter.verifying(&descriptor.name, &descriptor.version);
        match probe::verify_async(&plan.target, &descriptor.probe, self.probe_timeout).await {
            Ok(banner) => {
                self.reporter.done(&descriptor.name, &descriptor.version, &banner);
                Ok(banner)
            }
            Err(e) => {
                self.reporter
                    .failed(&descriptor.name, &descriptor.version, &e.to_string());
                Err(PackageFailure::new(descriptor.name.clone(), e))
            }
        }
    }
}
