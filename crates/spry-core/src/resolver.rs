use spry_schema::{Arch, ArtifactEntry, Host};

use crate::error::InstallError;

/// Picks the artifact entry for `host` from a package's platform matrix.
///
/// Entries are filtered by OS first. Among those, the first entry whose arch
/// equals the host arch wins; otherwise the first `arch = any` entry. The
/// function is pure: no I/O, and identical inputs always give the same entry.
///
/// # Errors
///
/// Returns [`InstallError::UnsupportedPlatform`] if no entry targets the host
/// OS, or if none of the OS matches fits the host architecture.
pub fn resolve<'a>(
    entries: &'a [ArtifactEntry],
    host: &Host,
) -> Result<&'a ArtifactEntry, InstallError> {
    let same_os = || entries.iter().filter(|e| e.os == host.os);

    let exact = same_os().find(|e| e.arch != Arch::Any && e.arch == host.arch);
    let any = || same_os().find(|e| e.arch == Arch::Any);

    exact.or_else(any).ok_or_else(|| unsupported(entries, host))
}

fn unsupported(entries: &[ArtifactEntry], host: &Host) -> InstallError {
    let mut platforms: Vec<String> = entries.iter().map(ArtifactEntry::platform).collect();
    platforms.dedup();
    InstallError::UnsupportedPlatform {
        host: host.to_string(),
        available: if platforms.is_empty() {
            "nothing".to_string()
        } else {
            platforms.join(", ")
        },
    }
}
