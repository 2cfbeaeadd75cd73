//! Cross-platform locations for resfs configuration and data
//!
//! - Linux: ~/.config/resfs and ~/.local/share/resfs
//! - Windows: %APPDATA%/resfs
//! - macOS: ~/Library/Application Support/resfs

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR_NAME: &str = "resfs";

/// Get the user's configuration directory for resfs
pub fn get_config_directory() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|p| p.join(".config")))
        .context("Could not determine config directory")?
        .join(APP_DIR_NAME);

    Ok(config_dir)
}

/// Get the user's data directory for resfs; the default profile directory
/// lives here
pub fn get_data_directory() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
        .context("Could not determine data directory")?
        .join(APP_DIR_NAME);

    Ok(data_dir)
}

/// Expand a path that starts with `~` or `~/` to the full home directory
/// path. `~user` paths are returned unchanged.
pub fn expand_home_path(path: &str) -> Result<PathBuf> {
    let relative_path = match path.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with(['/', '\\']) => {
            rest.trim_start_matches(['/', '\\'])
        }
        _ => return Ok(PathBuf::from(path)),
    };

    let home_dir = dirs::home_dir().context("Could not determine home directory")?;
    if relative_path.is_empty() {
        Ok(home_dir)
    } else {
        Ok(home_dir.join(relative_path))
    }
}
