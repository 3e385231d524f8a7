//! Catalog checksums: validation and algorithm inference.

use serde::Serialize;

/// Digest algorithms a catalog checksum may use.
///
/// The algorithm is never declared explicitly; it is implied by the length of
/// the hex digest (or by an optional `sha256:`/`sha512:` prefix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256, 64 hex characters.
    Sha256,
    /// SHA-512, 128 hex characters.
    Sha512,
}

impl HashAlgorithm {
    /// Number of hex characters in a digest of this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Lowercase algorithm name, also used as the optional digest prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            64 => Some(Self::Sha256),
            128 => Some(Self::Sha512),
            _ => None,
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a string was refused as a checksum.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    /// The checksum field was empty.
    #[error("checksum is empty")]
    Empty,

    /// The value contains non-hex characters, e.g. `PLACEHOLDER_MACOS_SHA256`.
    #[error("'{0}' is not a hex digest (placeholder?)")]
    NotHex(String),

    /// Hex digits, but no known algorithm produces a digest of that length.
    #[error("'{value}' has {len} hex characters, expected 64 (sha256) or 128 (sha512)")]
    UnknownLength {
        /// The rejected value.
        value: String,
        /// Number of hex characters found.
        len: usize,
    },

    /// A `sha256:`/`sha512:` prefix disagrees with the digest length.
    #[error("'{value}' is labelled {algorithm} but is not {expected} hex characters long")]
    PrefixMismatch {
        /// The rejected value.
        value: String,
        /// Algorithm named by the prefix.
        algorithm: HashAlgorithm,
        /// Length that algorithm requires.
        expected: usize,
    },
}

/// A validated content digest from the catalog.
///
/// Accepts strings with or without an algorithm prefix and stores the hex
/// digits lowercased, so comparisons against computed digests are
/// case-insensitive.
///
/// # Example
///
/// ```
/// use spry_schema::{Checksum, HashAlgorithm};
///
/// let sum = Checksum::parse(&"AB".repeat(32)).unwrap();
/// assert_eq!(sum.algorithm(), HashAlgorithm::Sha256);
/// assert!(sum.matches(&"ab".repeat(32)));
/// assert!(Checksum::parse("PLACEHOLDER_MACOS_SHA256").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Checksum {
    algorithm: HashAlgorithm,
    hex: String,
}

impl Checksum {
    /// Validate a checksum string.
    ///
    /// # Errors
    ///
    /// Returns a [`ChecksumError`] if the value is empty, contains non-hex
    /// characters, or has a length no supported algorithm produces.
    pub fn parse(value: &str) -> Result<Self, ChecksumError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ChecksumError::Empty);
        }

        let (prefix, hex) = match trimmed.split_once(':') {
            Some(("sha256", rest)) => (Some(HashAlgorithm::Sha256), rest),
            Some(("sha512", rest)) => (Some(HashAlgorithm::Sha512), rest),
            _ => (None, trimmed),
        };

        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChecksumError::NotHex(value.to_string()));
        }

        let algorithm = match (prefix, HashAlgorithm::from_hex_len(hex.len())) {
            (Some(declared), Some(found)) if declared == found => declared,
            (Some(declared), _) => {
                return Err(ChecksumError::PrefixMismatch {
                    value: value.to_string(),
                    algorithm: declared,
                    expected: declared.hex_len(),
                });
            }
            (None, Some(found)) => found,
            (None, None) => {
                return Err(ChecksumError::UnknownLength {
                    value: value.to_string(),
                    len: hex.len(),
                });
            }
        };

        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Algorithm implied by the digest.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Lowercase hex digits, without prefix.
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Case-insensitive comparison against a computed hex digest.
    pub fn matches(&self, actual_hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(actual_hex)
    }

    /// First twelve hex digits, for compact display.
    pub fn short(&self) -> &str {
        &self.hex[..12]
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hex)
    }
}

impl AsRef<str> for Checksum {
    fn as_ref(&self) -> &str {
        &self.hex
    }
}

impl std::str::FromStr for Checksum {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
