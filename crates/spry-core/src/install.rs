//! Unpack & place
//!
//! Extraction happens in a scoped scratch directory. The located binary is
//! copied to a hidden temp file inside the install dir, made executable and
//! renamed over the target, so the target path only ever holds a complete
//! file. A previous binary is kept as a hidden backup until the caller
//! commits or rolls back.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use spry_schema::ArtifactEntry;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{InstallError, Stage};
use crate::io::extract::{ExtractError, normalize, unpacker_for};

type TargetLocks = Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>;

static TARGET_LOCKS: OnceLock<TargetLocks> = OnceLock::new();

/// Acquire the process-wide lock for one target path.
async fn lock_target(target: &Path) -> OwnedMutexGuard<()> {
    let lock = {
        let mut locks = TARGET_LOCKS
            .get_or_init(Default::default)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(target.to_path_buf()).or_default())
    };
    lock.lock_owned().await
}

/// A binary placed at its final path, still holding the target lock.
///
/// Dropping without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) behaves like `commit`.
#[derive(Debug)]
pub struct InstalledBinary {
    path: PathBuf,
    backup: Option<PathBuf>,
    replaced: bool,
    _guard: OwnedMutexGuard<()>,
}

impl InstalledBinary {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an existing binary was overwritten.
    pub fn replaced(&self) -> bool {
        self.replaced
    }

    /// Keep the new binary and discard the backup.
    pub fn commit(mut self) {
        self.discard_backup();
    }

    /// Restore the previous binary, or remove the new one if there was none.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error if the restore rename or removal fails.
    pub fn rollback(mut self) -> io::Result<()> {
        match self.backup.take() {
            Some(backup) => fs::rename(&backup, &self.path),
            None => match fs::remove_file(&self.path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        }
    }

    fn discard_backup(&mut self) {
        if let Some(backup) = self.backup.take()
            && let Err(e) = fs::remove_file(&backup)
        {
            warn!("Failed to remove backup {}: {e}", backup.display());
        }
    }
}

impl Drop for InstalledBinary {
    fn drop(&mut self) {
        self.discard_backup();
    }
}

/// Places verified artifacts into one install directory.
#[derive(Debug, Clone)]
pub struct Installer {
    install_dir: PathBuf,
    scratch_dir: Option<PathBuf>,
}

impl Installer {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            scratch_dir: None,
        }
    }

    /// Extract under `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    pub fn target_path(&self, entry: &ArtifactEntry) -> PathBuf {
        self.install_dir.join(&entry.binary_name)
    }

    /// Unpack `artifact` and place `entry.binary_name` into the install dir.
    ///
    /// # Errors
    ///
    /// * [`InstallError::ArtifactCorrupt`] if the archive cannot be read or
    ///   does not contain the declared binary.
    /// * [`InstallError::InstallTargetUnwritable`] if the install dir cannot
    ///   be created or written.
    pub async fn install(
        &self,
        artifact: &Path,
        entry: &ArtifactEntry,
    ) -> Result<InstalledBinary, InstallError> {
        let target = self.target_path(entry);
        let guard = lock_target(&target).await;

        let this = self.clone();
        let artifact = artifact.to_path_buf();
        let entry = entry.clone();
        let (backup, replaced) =
            tokio::task::spawn_blocking(move || this.place(&artifact, &entry))
                .await
                .map_err(|e| InstallError::io(Stage::Install)(io::Error::other(e)))??;

        Ok(InstalledBinary {
            path: target,
            backup,
            replaced,
            _guard: guard,
        })
    }

    fn place(
        &self,
        artifact: &Path,
        entry: &ArtifactEntry,
    ) -> Result<(Option<PathBuf>, bool), InstallError> {
        let scratch_failed = InstallError::io(Stage::Install);
        let mut staging = tempfile::Builder::new();
        staging.prefix("spry-unpack-");
        let staging = match &self.scratch_dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(&scratch_failed)?;
                staging.tempdir_in(dir).map_err(&scratch_failed)?
            }
            None => staging.tempdir().map_err(&scratch_failed)?,
        };

        let unpacker = unpacker_for(entry.format);
        let files = unpacker
            .unpack(artifact, staging.path())
            .map_err(|e| match e {
                ExtractError::Io(io) => InstallError::corrupt(format!("unreadable archive: {io}")),
                other => InstallError::corrupt(other),
            })?;

        let wanted = normalize(Path::new(&entry.source));
        let Some(found) = files
            .iter()
            .find(|f| normalize(&f.relative_path) == wanted)
        else {
            return Err(InstallError::corrupt(format!(
                "'{}' not found in archive (contains: {})",
                entry.source,
                describe_tree(staging.path())
            )));
        };
        if !fs::symlink_metadata(&found.absolute_path).is_ok_and(|m| m.is_file()) {
            return Err(InstallError::corrupt(format!(
                "'{}' is not a regular file",
                entry.source
            )));
        }
        debug!("Located {} at {}", entry.binary_name, found.absolute_path.display());

        let target = self.target_path(entry);
        let unwritable = |source: io::Error| InstallError::InstallTargetUnwritable {
            path: self.install_dir.clone(),
            source,
        };

        fs::create_dir_all(&self.install_dir).map_err(unwritable)?;

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", entry.binary_name))
            .suffix(".spry-tmp")
            .tempfile_in(&self.install_dir)
            .map_err(unwritable)?;
        let mut source = fs::File::open(&found.absolute_path).map_err(&scratch_failed)?;
        io::copy(&mut source, temp.as_file_mut()).map_err(unwritable)?;
        temp.as_file().sync_all().map_err(unwritable)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o755))
                .map_err(unwritable)?;
        }

        let replaced = fs::symlink_metadata(&target).is_ok();
        let backup = if replaced {
            Some(self.backup_existing(&target, entry).map_err(unwritable)?)
        } else {
            None
        };

        if let Err(e) = temp.persist(&target) {
            if let Some(backup) = &backup {
                let _ = fs::remove_file(backup);
            }
            return Err(unwritable(e.error));
        }

        Ok((backup, replaced))
    }

    fn backup_existing(&self, target: &Path, entry: &ArtifactEntry) -> io::Result<PathBuf> {
        let backup = self
            .install_dir
            .join(format!(".{}.spry-backup", entry.binary_name));
        match fs::remove_file(&backup) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }
        if fs::hard_link(target, &backup).is_err() {
            fs::copy(target, &backup)?;
        }
        Ok(backup)
    }
}

/// Short listing of an extracted tree for error messages.
fn describe_tree(root: &Path) -> String {
    const LIMIT: usize = 20;

    let mut paths: Vec<String> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| !e.file_type().is_dir())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.display().to_string())
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return "nothing".to_string();
    }
    let more = paths.len().saturating_sub(LIMIT);
    paths.truncate(LIMIT);
    let mut listing = paths.join(", ");
    if more > 0 {
        listing.push_str(&format!(" and {more} more"));
    }
    listing
}
