//! Runtime configuration.
//!
//! Resolution order, later wins: built-in defaults, `~/.spry/config.toml`,
//! `SPRY_*` environment variables, command-line flags (applied by the CLI).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::InstallError;
use crate::paths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory receiving installed executables.
    pub bin_dir: PathBuf,
    /// Catalog file replacing the built-in catalog.
    pub catalog: Option<PathBuf>,
    /// Base URL of a mirror holding artifacts under their original file names.
    pub mirror_url: Option<String>,
    /// Download attempts per URL, counting the first one.
    pub max_attempts: u32,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// How long the smoke-test probe may run.
    pub probe_timeout_secs: u64,
    /// Packages installed concurrently.
    pub jobs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bin_dir: paths::default_bin_dir(),
            catalog: None,
            mirror_url: None,
            max_attempts: 3,
            timeout_secs: 300,
            probe_timeout_secs: 30,
            jobs: 4,
        }
    }
}

impl Config {
    /// Load `~/.spry/config.toml` if present, then apply environment overrides.
    pub fn load() -> Result<Self, InstallError> {
        let mut config = Self::from_file(&paths::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file; a missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, InstallError> {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|e| {
                InstallError::Config(format!("{}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `SPRY_BIN_DIR`, `SPRY_CATALOG` and `SPRY_MIRROR_URL`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("SPRY_BIN_DIR").filter(|v| !v.is_empty()) {
            self.bin_dir = PathBuf::from(dir);
        }
        if let Some(catalog) = lookup("SPRY_CATALOG").filter(|v| !v.is_empty()) {
            self.catalog = Some(PathBuf::from(catalog));
        }
        if let Some(mirror) = lookup("SPRY_MIRROR_URL").filter(|v| !v.is_empty()) {
            self.mirror_url = Some(mirror);
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
