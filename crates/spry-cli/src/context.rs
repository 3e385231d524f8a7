//! Shared command context: configuration with CLI overrides and the catalog.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use spry_core::{Catalog, Config, Pipeline, Reporter};
use spry_schema::Host;

use crate::Cli;

/// Resolved settings every command starts from.
pub struct Context {
    pub config: Config,
    pub catalog: Catalog,
    pub host: Host,
    pub dry_run: bool,
    pub quiet: bool,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("host", &self.host)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Config file and environment first, then command-line flags.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = Config::load()?;
        apply_flags(&mut config, cli);
        tracing::debug!(?config, "configuration resolved");

        let catalog = match &config.catalog {
            Some(path) => Catalog::load(path)
                .with_context(|| format!("Failed to load catalog {}", path.display()))?,
            None => Catalog::builtin().context("Built-in catalog is invalid")?,
        };

        Ok(Self {
            config,
            catalog,
            host: Host::detect(),
            dry_run: cli.dry_run,
            quiet: cli.quiet,
        })
    }

    pub fn pipeline(&self, reporter: Arc<dyn Reporter>) -> Result<Pipeline> {
        let pipeline = Pipeline::new(self.catalog.clone(), &self.config, reporter)?;
        Ok(pipeline.with_host(self.host.clone()))
    }
}

fn apply_flags(config: &mut Config, cli: &Cli) {
    if let Some(dir) = &cli.bin_dir {
        config.bin_dir.clone_from(dir);
    }
    if let Some(catalog) = &cli.catalog {
        config.catalog = Some(catalog.clone());
    }
    if let Some(jobs) = cli.jobs {
        config.jobs = jobs.max(1);
    }
}
