//! Package descriptors, artifact entries and their TOML wire records.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

use crate::hash::Checksum;
use crate::platform::{Arch, Os};

/// Packaging format of a downloadable artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactFormat {
    /// A (usually gzip-compressed) tar archive.
    #[serde(alias = "tar.gz", alias = "tgz")]
    Tarball,
    /// A Debian `.deb` package; only its file-system payload is used.
    #[serde(alias = "deb")]
    DebianPackage,
}

impl ArtifactFormat {
    /// In-archive path of the executable when the catalog does not name one.
    pub fn default_source(self, binary_name: &str) -> String {
        match self {
            Self::Tarball => binary_name.to_string(),
            Self::DebianPackage => format!("usr/bin/{binary_name}"),
        }
    }

    /// Convert to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tarball => "tarball",
            Self::DebianPackage => "debian-package",
        }
    }
}

impl std::fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized package name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    /// Create a new package name, normalizing the input to lowercase.
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }

    /// Return the normalized name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<PackageName> for String {
    fn from(name: PackageName) -> Self {
        name.0
    }
}

fn default_probe() -> Vec<String> {
    vec!["--version".to_string()]
}

/// Top-level layout of a catalog TOML document.
///
/// ```toml
/// [[package]]
/// name = "spry-sqlpage"
/// version = "0.1.0"
///
/// [[package.artifact]]
/// os = "linux"
/// url = "https://example.com/spry-sqlpage_0.1.0_amd64.deb"
/// sha256 = "95a1f8c4..."
/// format = "debian-package"
/// binary = "spry-sqlpage"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Every package declared in the document.
    #[serde(default, rename = "package")]
    pub packages: Vec<PackageRecord>,
}

/// One `[[package]]` table, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Package name.
    pub name: String,
    /// Release version (must be semver).
    pub version: String,
    /// SPDX license identifier.
    #[serde(default)]
    pub license: String,
    /// Short human-readable summary.
    #[serde(default, alias = "desc")]
    pub description: String,
    /// Project homepage.
    #[serde(default)]
    pub homepage: String,
    /// Arguments passed to the installed binary as a smoke test.
    #[serde(default = "default_probe")]
    pub probe: Vec<String>,
    /// Platform matrix.
    #[serde(default, rename = "artifact")]
    pub artifacts: Vec<ArtifactRecord>,
}

/// One `[[package.artifact]]` row, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Operating system the artifact runs on.
    pub os: Os,
    /// CPU architecture; omitted means any.
    #[serde(default)]
    pub arch: Arch,
    /// Download URL.
    pub url: String,
    /// Expected digest, as written by the catalog author.
    #[serde(alias = "checksum")]
    pub sha256: String,
    /// Packaging format.
    pub format: ArtifactFormat,
    /// File name of the installed executable.
    pub binary: String,
    /// In-archive path of the executable, if not the format default.
    #[serde(default)]
    pub source: Option<String>,
}

/// One validated row of a package's platform matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// Operating system the artifact runs on.
    pub os: Os,
    /// CPU architecture, or [`Arch::Any`].
    pub arch: Arch,
    /// Download URL.
    pub url: String,
    /// Expected digest of the downloaded bytes.
    pub checksum: Checksum,
    /// Packaging format, selects the unpacker.
    pub format: ArtifactFormat,
    /// File name of the installed executable.
    pub binary_name: String,
    /// Path of the executable inside the extracted artifact.
    pub source: String,
}

impl ArtifactEntry {
    /// Last path segment of the download URL.
    pub fn file_name(&self) -> &str {
        file_name_from_url(&self.url)
    }

    /// `os/arch` label used in messages.
    pub fn platform(&self) -> String {
        format!("{}/{}", self.os, self.arch)
    }
}

/// An installable tool with its platform matrix. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    /// Package name.
    pub name: PackageName,
    /// Release version.
    pub version: semver::Version,
    /// SPDX license identifier.
    pub license: String,
    /// Short human-readable summary.
    pub description: String,
    /// Project homepage.
    pub homepage: String,
    /// Smoke-test arguments for the installed binary.
    pub probe: Vec<String>,
    /// Platform matrix, in declaration order.
    pub artifacts: Vec<ArtifactEntry>,
}

impl PackageDescriptor {
    /// Distinct binary names this package can install.
    pub fn binary_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .artifacts
            .iter()
            .map(|a| a.binary_name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Extract the filename from a URL.
///
/// # Example
///
/// ```
/// use spry_schema::file_name_from_url;
///
/// assert_eq!(file_name_from_url("https://example.com/path/to/file.tar.gz"), "file.tar.gz");
/// assert_eq!(file_name_from_url(""), "");
/// ```
pub fn file_name_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.split('/').next_back().unwrap_or("")
}
