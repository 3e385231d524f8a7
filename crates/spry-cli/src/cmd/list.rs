//! List command

use anyhow::Result;
use spry_core::resolver::resolve;

use crate::Context;
use crate::ui::list::{print_list_footer, print_list_header, print_list_row};

/// List catalog packages with the platform each resolves to on this host.
pub fn list(ctx: &Context) -> Result<()> {
    let packages = ctx.catalog.packages();

    if packages.is_empty() {
        println!();
        println!("  The catalog is empty.");
        return Ok(());
    }

    print_list_header();
    for package in packages {
        let platform = resolve(&package.artifacts, &ctx.host)
            .ok()
            .map(spry_schema::ArtifactEntry::platform);
        print_list_row(package, platform.as_deref());
    }
    print_list_footer(packages.len(), &ctx.host.to_string());

    Ok(())
}
