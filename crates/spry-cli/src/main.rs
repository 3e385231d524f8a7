//! spry-pkg - installer for the Spry release binaries

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use spry_cli::cmd;
use spry_cli::{Cli, Commands, Context};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never mix with command output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Hash { files } => cmd::hash::hash(files),
        Commands::Completions { shell } => {
            cmd::completions::completions(*shell);
            Ok(())
        }
        Commands::Install { packages } => {
            let ctx = Context::load(&cli)?;
            cmd::install::install(&ctx, packages).await
        }
        Commands::Verify { packages } => {
            let ctx = Context::load(&cli)?;
            cmd::verify::verify(&ctx, packages).await
        }
        Commands::List => cmd::list::list(&Context::load(&cli)?),
        Commands::Info { package } => cmd::info::info(&Context::load(&cli)?, package),
    }
}
