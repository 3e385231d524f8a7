//! Info command

use anyhow::Result;
use crossterm::style::Stylize;
use spry_core::resolver::resolve;

use crate::Context;
use crate::ui::list::print_artifacts;

/// Show a catalog package and its artifact matrix.
pub fn info(ctx: &Context, package: &str) -> Result<()> {
    let descriptor = ctx.catalog.lookup(package)?;
    let selected = resolve(&descriptor.artifacts, &ctx.host).ok();

    let lw = 12;

    println!();
    println!(
        "  {} {}",
        descriptor.name.as_str().white().bold(),
        descriptor.version.to_string().dark_grey()
    );
    if !descriptor.description.is_empty() {
        println!("  {}", descriptor.description);
    }
    println!();

    if !descriptor.homepage.is_empty() {
        println!("  {:<lw$}{}", "homepage", descriptor.homepage);
    }
    if !descriptor.license.is_empty() {
        println!("  {:<lw$}{}", "license", descriptor.license);
    }
    println!("  {:<lw$}{}", "binaries", descriptor.binary_names().join(", "));
    println!("  {:<lw$}{}", "probe", descriptor.probe.join(" "));
    match selected {
        Some(entry) => println!(
            "  {:<lw$}{}",
            "target",
            ctx.config.bin_dir.join(&entry.binary_name).display()
        ),
        None => println!(
            "  {:<lw$}{}",
            "target",
            format!("unsupported on {}", ctx.host).yellow()
        ),
    }

    println!();
    print_artifacts(&descriptor.artifacts, selected);

    Ok(())
}
