//! Operating system and CPU architecture identifiers.
//!
//! The catalog only ever names `macos`/`linux` and `arm64`/`amd64`/`any`.
//! Hosts outside that set are still representable through the `Other`
//! variants so the resolver can report exactly what it was asked for.

use serde::{Deserialize, Serialize};

/// Operating system family of a host or an artifact entry.
///
/// # Example
///
/// ```
/// use spry_schema::Os;
///
/// let os: Os = "darwin".parse().unwrap();
/// assert_eq!(os, Os::Macos);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Apple macOS.
    #[serde(alias = "darwin")]
    Macos,
    /// Any Linux distribution.
    Linux,
    /// An operating system no catalog entry can name.
    #[serde(skip)]
    Other(String),
}

impl Os {
    /// Query the operating system this process runs on.
    pub fn current() -> Self {
        std::env::consts::OS
            .parse()
            .unwrap_or_else(|_| Self::Other(std::env::consts::OS.to_string()))
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Macos => "macos",
            Self::Linux => "linux",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "macos" | "darwin" | "osx" => Ok(Self::Macos),
            "linux" => Ok(Self::Linux),
            _ => Err(format!("Unknown operating system: {s}")),
        }
    }
}

/// CPU architecture of a host or an artifact entry.
///
/// `Any` only appears in the catalog and matches every host architecture
/// when no more specific entry exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit ARM (Apple Silicon, Graviton, ...).
    #[serde(alias = "aarch64")]
    Arm64,
    /// 64-bit x86.
    #[serde(alias = "x86_64")]
    Amd64,
    /// Architecture-independent catalog entry.
    #[default]
    Any,
    /// An architecture no catalog entry can name.
    #[serde(skip)]
    Other(String),
}

impl Arch {
    /// Query the CPU architecture this process runs on.
    pub fn current() -> Self {
        match std::env::consts::ARCH {
            "aarch64" => Self::Arm64,
            "x86_64" => Self::Amd64,
            other => Self::Other(other.to_string()),
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Arm64 => "arm64",
            Self::Amd64 => "amd64",
            Self::Any => "any",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "amd64" | "x86_64" | "x64" => Ok(Self::Amd64),
            "any" => Ok(Self::Any),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}

/// The (OS, architecture) pair an installation runs on.
///
/// Obtained from the environment with [`Host::detect`], or built by hand to
/// simulate other hosts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Host {
    /// Operating system family.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
}

impl Host {
    /// Describe an arbitrary host.
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Probe the running host.
    pub fn detect() -> Self {
        Self::new(Os::current(), Arch::current())
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
