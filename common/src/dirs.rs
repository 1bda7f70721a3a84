//! XDG directory utilities for linvoc.

use std::path::PathBuf;

use anyhow::{Context, Result};
use xdg::BaseDirectories;

const APP_NAME: &str = "linvoc";

fn base_dirs() -> BaseDirectories {
    BaseDirectories::with_prefix(APP_NAME)
}

/// Return the XDG state directory, creating it if needed.
/// `~/.local/state/linvoc/`
pub fn state_dir() -> Result<PathBuf> {
    let dir = base_dirs()
        .get_state_home()
        .context("Failed to get XDG state directory (HOME not set?)")?;
    std::fs::create_dir_all(&dir).context("Failed to create state directory")?;
    Ok(dir)
}

/// Return the XDG config directory (no creation - config may not exist yet).
/// `~/.config/linvoc/`
pub fn config_dir() -> Result<PathBuf> {
    base_dirs()
        .get_config_home()
        .context("Could not determine config directory (HOME not set?)")
}

/// Return the XDG data directory, creating it if needed.
/// `~/.local/share/linvoc/`
pub fn data_dir() -> Result<PathBuf> {
    let dir = base_dirs()
        .get_data_home()
        .context("Could not determine data directory (HOME not set?)")?;
    std::fs::create_dir_all(&dir).context("Failed to create data directory")?;
    Ok(dir)
}

/// The user's XDG config home, not prefixed with the app name.
/// `~/.config/`
pub fn user_config_home() -> Result<PathBuf> {
    BaseDirectories::new()
        .get_config_home()
        .context("Could not determine config home (HOME not set?)")
}

/// The user's XDG data home, not prefixed with the app name.
/// `~/.local/share/`
pub fn user_data_home() -> Result<PathBuf> {
    BaseDirectories::new()
        .get_data_home()
        .context("Could not determine data home (HOME not set?)")
}

/// Log file of the long-running instance.
/// `~/.local/state/linvoc/linvoc.log`
pub fn log_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("linvoc.log"))
}

/// Directory holding single-instance lock records.
///
/// Locks live in the system temporary directory so they are shared by every
/// session of the same user and vanish on reboot.
pub fn lock_dir() -> PathBuf {
    std::env::temp_dir()
}
