use dirs::home_dir;
use std::path::PathBuf;

/// Returns the configuration directory, or None if the user's home cannot be resolved.
pub fn try_spry_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("SPRY_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".spry"))
}

/// Returns the spry-pkg home directory (`~/.spry`), falling back to a
/// relative `.spry` when no home directory exists.
pub fn spry_home() -> PathBuf {
    try_spry_home().unwrap_or_else(|| PathBuf::from(".spry"))
}

/// Config file path: ~/.spry/config.toml
pub fn config_path() -> PathBuf {
    spry_home().join("config.toml")
}

/// Conventional per-OS install target.
///
/// Linux has a user executable directory (`~/.local/bin`); macOS has none,
/// so binaries go to `~/.spry/bin`.
pub fn default_bin_dir() -> PathBuf {
    dirs::executable_dir().unwrap_or_else(|| spry_home().join("bin"))
}
