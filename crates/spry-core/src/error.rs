//! Error taxonomy for the install pipeline

use std::path::PathBuf;

use spry_schema::{ChecksumError, PackageName};
use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Catalog,
    Resolve,
    Fetch,
    Install,
    Verify,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Resolve => "resolve",
            Self::Fetch => "fetch",
            Self::Install => "install",
            Self::Verify => "verify",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("unknown package '{0}'")]
    UnknownPackage(String),

    #[error("invalid checksum for {package} on {platform}: {reason}")]
    InvalidChecksumPlaceholder {
        package: String,
        platform: String,
        #[source]
        reason: ChecksumError,
    },

    #[error("invalid catalog: {0}")]
    Catalog(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("no artifact for host {host} (catalog covers: {available})")]
    UnsupportedPlatform { host: String, available: String },

    #[error("download of {url} failed after {attempts} attempt(s): {reason}")]
    DownloadFailed {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("artifact corrupt: {0}")]
    ArtifactCorrupt(String),

    #[error("install target {} is not writable: {source}", .path.display())]
    InstallTargetUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} {args} exited with {status}", .path.display())]
    VerificationFailed {
        path: PathBuf,
        args: String,
        status: String,
    },

    #[error("cannot execute {}: {source}", .path.display())]
    ExecutionError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error during {stage}: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    /// Stage of the pipeline this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::UnknownPackage(_)
            | Self::InvalidChecksumPlaceholder { .. }
            | Self::Catalog(_)
            | Self::Config(_) => Stage::Catalog,
            Self::UnsupportedPlatform { .. } => Stage::Resolve,
            Self::DownloadFailed { .. } | Self::ChecksumMismatch { .. } => Stage::Fetch,
            Self::ArtifactCorrupt(_) | Self::InstallTargetUnwritable { .. } => Stage::Install,
            Self::VerificationFailed { .. } | Self::ExecutionError { .. } => Stage::Verify,
            Self::Io { stage, .. } => *stage,
        }
    }

    /// Whether a fresh attempt against the same source could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DownloadFailed { .. })
    }

    /// Verification failures leave a usable binary behind; everything else
    /// aborts the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::VerificationFailed { .. })
    }

    /// Wrap a local IO failure in the stage it happened in.
    pub fn io(stage: Stage) -> impl Fn(std::io::Error) -> Self {
        move |source| Self::Io { stage, source }
    }

    pub fn corrupt(msg: impl std::fmt::Display) -> Self {
        Self::ArtifactCorrupt(msg.to_string())
    }
}

/// A terminal error tagged with the package it happened to.
#[derive(Error, Debug)]
#[error("{package}: {} failed: {error}", .error.stage())]
pub struct PackageFailure {
    pub package: PackageName,
    #[source]
    pub error: InstallError,
}

impl PackageFailure {
    pub fn new(package: impl Into<PackageName>, error: InstallError) -> Self {
        Self {
            package: package.into(),
            error,
        }
    }

    pub fn stage(&self) -> Stage {
        self.error.stage()
    }
}
