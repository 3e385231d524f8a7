//! Verify command

use std::sync::Arc;

use anyhow::{Result, bail};

use crate::Context;
use crate::cmd::install::report_unstarted;
use crate::ui::Output;

/// Run the probe against each already installed package.
pub async fn verify(ctx: &Context, packages: &[String]) -> Result<()> {
    let output = Output::new(ctx.quiet);
    let pipeline = ctx.pipeline(Arc::new(output.clone()))?;

    let mut failures = 0;
    for package in packages {
        if let Err(failure) = pipeline.verify_package(package).await {
            report_unstarted(&output, &failure);
            failures += 1;
        }
    }
    output.wait().await;

    if failures > 0 {
        bail!("{failures} of {} package(s) failed verification", packages.len());
    }
    Ok(())
}
