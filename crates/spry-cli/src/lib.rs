//! spry-pkg - installer for the Spry release binaries
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Installs `spry-runbook` and `spry-sqlpage` from their published release
//! artifacts: the catalog row for the current host is resolved, the artifact
//! is downloaded and checked against its pinned digest, the executable is
//! unpacked from the tarball or `.deb` into the bin directory and finally
//! smoke-tested with `--version`.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.spry/
//! └── config.toml   # optional, see spry_core::Config
//! ~/.local/bin/     # default install target on Linux
//! ```

pub mod cmd;
pub mod context;
pub mod ui;

pub use context::Context;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "spry-pkg")]
#[command(author, version, about = "spry-pkg - install Spry release binaries")]
pub struct Cli {
    /// Resolve and print the artifact without downloading anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Install directory (overrides config and SPRY_BIN_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub bin_dir: Option<PathBuf>,

    /// Catalog file to use instead of the built-in one
    #[arg(long, global = true, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Packages installed concurrently
    #[arg(short, long, global = true, value_name = "N")]
    pub jobs: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install one or more packages
    Install {
        /// Package name(s), e.g. spry-sqlpage
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Run the smoke test against already installed packages
    Verify {
        /// Package name(s)
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// List catalog packages and what this host resolves to
    List,
    /// Show a package and its artifact matrix
    Info {
        /// Package name
        package: String,
    },
    /// Compute the SHA256 of local files (for catalog authoring)
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
