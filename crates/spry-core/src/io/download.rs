//! Artifact download with streaming checksum verification.
//!
//! Every fetch lands in its own scratch directory owned by the returned
//! [`VerifiedArtifact`]; dropping it (or failing) removes the file. A file
//! that fails verification is deleted before the error is returned.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use reqwest::Client;
use semver::Version;
use sha2::{Digest, Sha256, Sha512};
use spry_schema::{ArtifactEntry, Checksum, HashAlgorithm, PackageName};
use tempfile::TempDir;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::Reporter;
use crate::config::Config;
use crate::error::{InstallError, Stage};

/// Base delay between retries; doubles per attempt.
const BASE_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

impl DownloadError {
    /// Transport failures worth another attempt. Client errors other than
    /// timeouts and rate limiting will not change on retry.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => match e.status() {
                Some(status) if status.is_client_error() => {
                    status == reqwest::StatusCode::REQUEST_TIMEOUT
                        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                }
                _ => true,
            },
            Self::Io(_) | Self::HashMismatch { .. } => false,
        }
    }
}

/// Incremental digest for whichever algorithm a checksum implies.
pub enum StreamHasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl StreamHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Compute the hex digest of a local file (streaming).
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = StreamHasher::new(algorithm);
    let mut buffer = [0u8; 65536]; // 64KB buffer

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize_hex())
}

/// A downloaded file whose digest matched the catalog.
///
/// Owns its scratch directory: the file disappears when this value drops.
#[derive(Debug)]
pub struct VerifiedArtifact {
    _dir: TempDir,
    path: PathBuf,
    url: String,
    digest: String,
    size: u64,
}

impl VerifiedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// URL the bytes actually came from (mirror or canonical).
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Request for a download operation
pub struct DownloadRequest<'a> {
    pub pkg_name: &'a PackageName,
    pub version: &'a Version,
    pub entry: &'a ArtifactEntry,
    pub reporter: &'a dyn Reporter,
}

/// Downloads catalog artifacts with bounded retries and optional mirror.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_attempts: u32,
    mirror_url: Option<String>,
    retry_base: Duration,
    scratch_dir: Option<PathBuf>,
}

impl Fetcher {
    pub fn new(client: Client, max_attempts: u32) -> Self {
        Self {
            client,
            max_attempts: max_attempts.max(1),
            mirror_url: None,
            retry_base: BASE_RETRY_DELAY,
            scratch_dir: None,
        }
    }

    /// Build the HTTP client and retry policy from configuration.
    pub fn from_config(config: &Config) -> Result<Self, InstallError> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(config.timeout())
            .build()
            .map_err(|e| InstallError::Config(format!("HTTP client: {e}")))?;

        let mut fetcher = Self::new(client, config.max_attempts);
        fetcher.mirror_url.clone_from(&config.mirror_url);
        Ok(fetcher)
    }

    pub fn with_mirror(mut self, mirror_url: impl Into<String>) -> Self {
        self.mirror_url = Some(mirror_url.into());
        self
    }

    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// Create per-fetch scratch directories under `dir` instead of the
    /// system temp directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Download the entry's artifact and verify it against the catalog digest.
    ///
    /// With a mirror configured, the mirror is tried first; a transport
    /// failure or digest mismatch there triggers exactly one fetch from the
    /// canonical URL.
    pub async fn fetch_and_verify(
        &self,
        req: &DownloadRequest<'_>,
    ) -> Result<VerifiedArtifact, InstallError> {
        if let Some(mirror) = &self.mirror_url {
            let url = mirror_artifact_url(mirror, req.entry.file_name());
            match self.fetch_url(&url, req).await {
                Ok(artifact) => return Ok(artifact),
                Err(e @ (InstallError::ChecksumMismatch { .. } | InstallError::DownloadFailed { .. })) => {
                    tracing::warn!(%url, error = %e, "mirror fetch failed, using canonical url");
                    req.reporter
                        .warning(&format!("{}: mirror failed ({e}), trying {}", req.pkg_name, req.entry.url));
                }
                Err(e) => return Err(e),
            }
        }

        self.fetch_url(&req.entry.url, req).await
    }

    async fn fetch_url(
        &self,
        url: &str,
        req: &DownloadRequest<'_>,
    ) -> Result<VerifiedArtifact, InstallError> {
        let dir = match &self.scratch_dir {
            Some(base) => {
                tokio::fs::create_dir_all(base)
                    .await
                    .map_err(InstallError::io(Stage::Fetch))?;
                tempfile::Builder::new()
                    .prefix("spry-fetch-")
                    .tempdir_in(base)
                    .map_err(InstallError::io(Stage::Fetch))?
            }
            None => tempfile::Builder::new()
                .prefix("spry-fetch-")
                .tempdir()
                .map_err(InstallError::io(Stage::Fetch))?,
        };
        let file_name = match req.entry.file_name() {
            "" => "artifact",
            name => name,
        };
        let dest = dir.path().join(file_name);

        let mut last_error = String::new();
        let mut attempts = 0;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = retry_delay(self.retry_base, attempt);
                tracing::info!(
                    %url,
                    attempt = attempt + 1,
                    max = self.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retrying download"
                );
                tokio::time::sleep(delay).await;
            }
            attempts = attempt + 1;

            match download_and_verify(&self.client, url, &dest, &req.entry.checksum, req).await {
                Ok((digest, size)) => {
                    tracing::debug!(%url, %digest, size, "artifact verified");
                    return Ok(VerifiedArtifact {
                        _dir: dir,
                        path: dest,
                        url: url.to_string(),
                        digest,
                        size,
                    });
                }
                Err(DownloadError::HashMismatch { expected, actual }) => {
                    return Err(InstallError::ChecksumMismatch {
                        url: url.to_string(),
                        expected,
                        actual,
                    });
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(&dest).await;
                    let retryable = e.is_retryable();
                    tracing::warn!(%url, attempt = attempts, error = %e, retryable, "download attempt failed");
                    last_error = e.to_string();
                    if let DownloadError::Io(io) = e {
                        return Err(InstallError::io(Stage::Fetch)(io));
                    }
                    if !retryable {
                        break;
                    }
                }
            }
        }

        Err(InstallError::DownloadFailed {
            url: url.to_string(),
            attempts,
            reason: last_error,
        })
    }
}

/// Stream `url` into `dest`, hashing as bytes arrive.
///
/// On digest mismatch the file is removed before returning.
pub async fn download_and_verify(
    client: &Client,
    url: &str,
    dest: &Path,
    expected: &Checksum,
    req: &DownloadRequest<'_>,
) -> Result<(String, u64), DownloadError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let total_size = response.content_length();

    req.reporter
        .downloading(req.pkg_name, req.version, 0, total_size);

    let mut file = File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut hasher = StreamHasher::new(expected.algorithm());
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
        req.reporter
            .downloading(req.pkg_name, req.version, downloaded, total_size);
    }

    file.flush().await?;
    drop(file);
    let actual_hash = hasher.finalize_hex();

    if !expected.matches(&actual_hash) {
        tokio::fs::remove_file(dest).await.ok();
        return Err(DownloadError::HashMismatch {
            expected: expected.to_string(),
            actual: actual_hash,
        });
    }

    Ok((actual_hash, downloaded))
}

fn mirror_artifact_url(mirror: &str, file_name: &str) -> String {
    format!("{}/{file_name}", mirror.trim_end_matches('/'))
}

/// Exponential backoff with +/- 25% jitter.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64 * 2u64.pow(attempt.saturating_sub(1));
    let jitter_range = base_ms / 4;
    let jitter = rand::rng().random_range(0..=jitter_range * 2);
    Duration::from_millis(base_ms - jitter_range + jitter)
}
