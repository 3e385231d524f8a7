//! Hash command

use std::path::PathBuf;

use anyhow::{Context, Result};
use spry_core::io::download::hash_file;
use spry_schema::HashAlgorithm;

/// Print the SHA256 of each file, in `sha256sum` format.
pub fn hash(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let digest = hash_file(file, HashAlgorithm::Sha256)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        println!("{digest}  {}", file.display());
    }
    Ok(())
}
