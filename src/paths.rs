//! Centralized path resolution for the provider
//!
//! # Environment Variables
//!
//! - `UTILITIES_CONFIG` - Override the configuration file
//! - `UTILITIES_STATE_DIR` - Override the state directory
//!
//! # Path Resolution Priority
//!
//! For config_file():
//! 1. `UTILITIES_CONFIG` environment variable
//! 2. `./utilities.toml` in the working directory, if present
//! 3. `XDG_CONFIG_HOME/utilities/utilities.toml` (if set)
//! 4. Platform default:
//!    - Windows: `%APPDATA%\utilities\utilities.toml`
//!    - macOS/Linux: `~/.config/utilities/utilities.toml`
//!
//! For state_dir():
//! 1. `UTILITIES_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/utilities` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\utilities`
//!    - macOS/Linux: `~/.local/state/utilities`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config file override
pub const ENV_CONFIG: &str = "UTILITIES_CONFIG";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "UTILITIES_STATE_DIR";

/// File name of the configuration file
pub const CONFIG_FILE_NAME: &str = "utilities.toml";

/// File name of the state file inside the state directory
pub const STATE_FILE_NAME: &str = "state.toml";

const APP_DIR: &str = "utilities";

/// Get the configuration file path
pub fn config_file() -> Result<PathBuf> {
    // 1. Check environment variable override
    if let Ok(file) = std::env::var(ENV_CONFIG) {
        let path = expand(&file);
        log::debug!("Using config file from {}: {}", ENV_CONFIG, path.display());
        return Ok(path);
    }

    // 2. Project-local configuration
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        log::debug!("Using config file in working directory");
        return Ok(local);
    }

    // 3. Check XDG_CONFIG_HOME
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR).join(CONFIG_FILE_NAME);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    // 4. Platform default
    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join(APP_DIR).join(CONFIG_FILE_NAME);
            log::debug!("Using Windows config file: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR).join(CONFIG_FILE_NAME);
    log::debug!("Using default config file: {}", path.display());
    Ok(path)
}

/// Get the state directory path
pub fn state_dir() -> Result<PathBuf> {
    // 1. Check environment variable override
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    // 2. Check XDG_STATE_HOME
    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    // 3. Platform default
    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            let path = local_app_data.join(APP_DIR);
            log::debug!("Using Windows state dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP_DIR);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Get the state file path
pub fn state_file() -> Result<PathBuf> {
    Ok(state_dir()?.join(STATE_FILE_NAME))
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as they are.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
