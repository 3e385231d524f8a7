//! Install command

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Result, bail};
use crossterm::style::Stylize;
use spry_core::{PackageFailure, Stage, Verification};

use crate::Context;
use crate::ui::Output;

/// Install packages, or with `--dry-run` only show what would be fetched.
pub async fn install(ctx: &Context, packages: &[String]) -> Result<()> {
    let output = Output::new(ctx.quiet);
    let pipeline = ctx.pipeline(Arc::new(output.clone()))?;

    if ctx.dry_run {
        let mut failures = 0;
        for package in packages {
            match pipeline.plan(package) {
                Ok(plan) => println!(
                    "  {} {} {} {}\n    {} {}",
                    plan.descriptor.name.as_str().cyan(),
                    plan.descriptor.version,
                    plan.entry.platform().dark_grey(),
                    plan.entry.url,
                    "->".dark_grey(),
                    plan.target.display()
                ),
                Err(failure) => {
                    output.error(&failure.to_string());
                    failures += 1;
                }
            }
        }
        output.wait().await;
        if failures > 0 {
            bail!("{failures} of {} package(s) cannot be installed", packages.len());
        }
        return Ok(());
    }

    let started = Instant::now();
    let results = pipeline.install_many(packages).await;

    let mut installed = 0;
    let mut unverified = 0;
    let mut failures = 0;
    for result in &results {
        match result {
            Ok(report) => {
                installed += 1;
                if let Verification::Failed(_) = report.verification {
                    unverified += 1;
                }
            }
            Err(failure) => {
                failures += 1;
                report_unstarted(&output, failure);
            }
        }
    }

    if installed > 0 {
        let mut msg = format!(
            "{installed} package(s) installed to {} in {:.1}s",
            ctx.config.bin_dir.display(),
            started.elapsed().as_secs_f64()
        );
        if unverified > 0 {
            msg.push_str(&format!(", {unverified} unverified"));
        }
        output.success(&msg);
    }
    output.wait().await;

    if failures > 0 {
        bail!("{failures} of {} package(s) failed", results.len());
    }
    Ok(())
}

/// Failures before resolution have no progress line yet; print them here.
pub fn report_unstarted(output: &Output, failure: &PackageFailure) {
    if matches!(failure.stage(), Stage::Catalog | Stage::Resolve) {
        output.error(&failure.to_string());
    }
}
