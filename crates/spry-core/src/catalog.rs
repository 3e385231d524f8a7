//! Artifact catalog: package descriptors and their platform matrices.
//!
//! Loading validates everything up front, so a [`Catalog`] in hand only holds
//! entries that can actually be verified. Lookups never touch the filesystem.

use std::collections::HashSet;
use std::path::{Component, Path};

use spry_schema::{
    ArtifactEntry, ArtifactRecord, CatalogFile, Checksum, PackageDescriptor, PackageName,
    PackageRecord,
};

use crate::error::InstallError;

const BUILTIN: &str = include_str!("../catalog/spry.toml");

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    packages: Vec<PackageDescriptor>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self, InstallError> {
        Self::from_toml_str(BUILTIN)
    }

    /// Read and validate a catalog file.
    pub fn load(path: &Path) -> Result<Self, InstallError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| InstallError::Catalog(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a catalog document.
    pub fn from_toml_str(text: &str) -> Result<Self, InstallError> {
        let file: CatalogFile =
            toml::from_str(text).map_err(|e| InstallError::Catalog(e.to_string()))?;
        Self::from_file(file)
    }

    pub fn from_file(file: CatalogFile) -> Result<Self, InstallError> {
        let mut seen = HashSet::new();
        let mut packages = Vec::with_capacity(file.packages.len());

        for record in file.packages {
            let descriptor = validate_package(record)?;
            if !seen.insert(descriptor.name.clone()) {
                return Err(InstallError::Catalog(format!(
                    "package '{}' is declared twice",
                    descriptor.name
                )));
            }
            packages.push(descriptor);
        }

        tracing::debug!(packages = packages.len(), "catalog loaded");
        Ok(Self { packages })
    }

    /// Find a package by name (case-insensitive).
    pub fn lookup(&self, name: &str) -> Result<&PackageDescriptor, InstallError> {
        let wanted = PackageName::new(name);
        self.packages
            .iter()
            .find(|p| p.name == wanted)
            .ok_or_else(|| InstallError::UnknownPackage(wanted.to_string()))
    }

    pub fn packages(&self) -> &[PackageDescriptor] {
        &self.packages
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

fn validate_package(record: PackageRecord) -> Result<PackageDescriptor, InstallError> {
    let name = PackageName::new(&record.name);
    if name.is_empty() {
        return Err(InstallError::Catalog("package with empty name".to_string()));
    }

    let version = semver::Version::parse(record.version.trim_start_matches('v')).map_err(|e| {
        InstallError::Catalog(format!("{name}: invalid version '{}': {e}", record.version))
    })?;

    if record.artifacts.is_empty() {
        return Err(InstallError::Catalog(format!(
            "{name}: no artifacts declared"
        )));
    }

    let artifacts = record
        .artifacts
        .into_iter()
        .map(|row| validate_artifact(&name, row))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PackageDescriptor {
        name,
        version,
        license: record.license,
        description: record.description,
        homepage: record.homepage,
        probe: record.probe,
        artifacts,
    })
}

fn validate_artifact(
    package: &PackageName,
    row: ArtifactRecord,
) -> Result<ArtifactEntry, InstallError> {
    let platform = format!("{}/{}", row.os, row.arch);

    let checksum =
        Checksum::parse(&row.sha256).map_err(|reason| InstallError::InvalidChecksumPlaceholder {
            package: package.to_string(),
            platform: platform.clone(),
            reason,
        })?;

    if !(row.url.starts_with("https://") || row.url.starts_with("http://")) {
        return Err(InstallError::Catalog(format!(
            "{package} ({platform}): url must be http(s), got '{}'",
            row.url
        )));
    }

    if row.binary.is_empty() || row.binary.contains(['/', '\\']) || row.binary.starts_with('.') {
        return Err(InstallError::Catalog(format!(
            "{package} ({platform}): binary must be a plain file name, got '{}'",
            row.binary
        )));
    }

    let source = row
        .source
        .unwrap_or_else(|| row.format.default_source(&row.binary));
    if !is_relative_inside(Path::new(&source)) {
        return Err(InstallError::Catalog(format!(
            "{package} ({platform}): source must be a relative path inside the artifact, got '{source}'"
        )));
    }

    Ok(ArtifactEntry {
        os: row.os,
        arch: row.arch,
        url: row.url,
        checksum,
        format: row.format,
        binary_name: row.binary,
        source,
    })
}

fn is_relative_inside(path: &Path) -> bool {
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
