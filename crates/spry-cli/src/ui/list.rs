//! Column-aligned rendering for `spry-pkg list` and `spry-pkg info`.

use crossterm::style::Stylize;
use spry_schema::{ArtifactEntry, PackageDescriptor};

use super::theme::Theme;

pub fn print_list_header() {
    let layout = Theme::default().layout;
    let header = format!(
        "  {:<nw$} {:<vw$} {:<pw$} {}",
        "name",
        "version",
        "platform",
        "description",
        nw = layout.name_width,
        vw = layout.version_width,
        pw = layout.platform_width,
    );
    println!();
    println!("{}", header.dark_grey());
}

/// One catalog package; `platform` is what this host resolves to, if anything.
pub fn print_list_row(package: &PackageDescriptor, platform: Option<&str>) {
    let theme = Theme::default();
    let layout = &theme.layout;

    let name = format!("{:<w$}", package.name.as_str(), w = layout.name_width);
    let version = format!("{:<w$}", package.version, w = layout.version_width);
    let platform = match platform {
        Some(p) => format!("{p:<w$}", w = layout.platform_width).with(theme.colors.secondary),
        None => format!("{:<w$}", "unsupported", w = layout.platform_width)
            .with(theme.colors.warning),
    };

    println!(
        "  {} {} {} {}",
        name.with(theme.colors.package_name),
        version.with(theme.colors.version),
        platform,
        package.description.as_str().with(theme.colors.secondary)
    );
}

pub fn print_list_footer(count: usize, host: &str) {
    println!();
    println!("{}", format!("  {count} packages, host {host}").dark_grey());
}

/// Artifact matrix for `info`; `selected` marks the row this host resolves to.
pub fn print_artifacts(entries: &[ArtifactEntry], selected: Option<&ArtifactEntry>) {
    let theme = Theme::default();

    for entry in entries {
        let marker = if selected.is_some_and(|s| std::ptr::eq(s, entry)) {
            theme.icons.active.with(theme.colors.success)
        } else {
            theme.icons.pending.with(theme.colors.secondary)
        };
        println!(
            "  {marker} {:<pw$} {:<15} {} {}",
            entry.platform(),
            entry.format.as_str(),
            entry.binary_name.as_str().with(theme.colors.package_name),
            format!("<- {}", entry.source).with(theme.colors.secondary),
            pw = theme.layout.platform_width,
        );
        println!(
            "    {} {}",
            format!("{}:{}", entry.checksum.algorithm().as_str(), entry.checksum.short())
                .with(theme.colors.secondary),
            entry.url.as_str().with(theme.colors.secondary)
        );
    }
}
