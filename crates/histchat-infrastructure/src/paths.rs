//! Unified path management for histchat files.
//!
//! ```text
//! ~/.config/histchat/          # Config directory
//! ├── config.toml              # Application configuration
//! ├── secret.json              # API keys
//! └── figures.toml             # Figure catalog
//!
//! ~/.local/share/histchat/     # Data directory
//! └── histchat.db              # Guest sessions and threads (SQLite)
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "histchat";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for histchat_core::HistchatError {
    fn from(err: PathError) -> Self {
        histchat_core::HistchatError::config(err.to_string())
    }
}

/// Platform paths for histchat (XDG on Linux, the platform default elsewhere).
pub struct HistchatPaths;

impl HistchatPaths {
    /// Returns the histchat configuration directory (e.g. `~/.config/histchat/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the histchat data directory (e.g. `~/.local/share/histchat/`).
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the path to the secrets file.
    ///
    /// # Security Note
    ///
    /// Ensure this file has appropriate permissions (e.g., 600).
    pub fn secret_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("secret.json"))
    }

    pub fn figures_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("figures.toml"))
    }

    pub fn database_file() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("histchat.db"))
    }
}
