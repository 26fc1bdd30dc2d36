//! Application configuration management utilities.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;

/// Application-wide configuration stored in riivo.toml.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory searched for patch documents by `riivo scan`.
    pub riivolution_dir: Option<Utf8PathBuf>,
    /// Virtual SD card root that patch roots are resolved against.
    pub sd_root: Option<Utf8PathBuf>,
}

/// Returns the directory where the current executable resides.
pub fn install_dir() -> Option<Utf8PathBuf> {
    let exe = env::current_exe().ok()?;
    let parent = exe.parent()?;
    Utf8PathBuf::from_path_buf(parent.to_path_buf()).ok()
}

/// Returns the default configuration file path (riivo.toml next to the executable).
pub fn default_config_path() -> Option<Utf8PathBuf> {
    install_dir().map(|dir| dir.join("riivo.toml"))
}

/// Loads the application configuration from riivo.toml.
/// Returns default configuration if file doesn't exist or cannot be parsed.
pub fn load_config() -> AppConfig {
    default_config_path()
        .and_then(|path| fs::read_to_string(path.as_std_path()).ok())
        .map(|content| parse_config(&content))
        .unwrap_or_default()
}

/// Parses configuration text, falling back to defaults on syntax errors.
pub fn parse_config(content: &str) -> AppConfig {
    toml::from_str(content).unwrap_or_else(|e| {
        tracing::warn!("Ignoring invalid riivo.toml: {}", e);
        AppConfig::default()
    })
}

/// Saves the application configuration to riivo.toml.
pub fn save_config(cfg: &AppConfig) -> io::Result<()> {
    let path = default_config_path().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "Could not determine config path")
    })?;
    let content = toml::to_string_pretty(cfg).map_err(io::Error::other)?;
    fs::write(path.as_std_path(), content)
}
