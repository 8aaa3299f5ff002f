//! OS directory resolution for config and log files.

use std::io;
use std::path::{Path, PathBuf};

/// Errors that can occur while resolving or creating directories.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The OS did not provide a configuration directory.
    #[error("could not determine OS configuration directory")]
    NoConfigDir,
    /// Directory creation failed.
    #[error("platform I/O error: {0}")]
    Io(#[from] io::Error),
}

/// OS-specific directories for the streamer.
///
/// Follows OS conventions (XDG on Linux, Known Folders on Windows, Library on
/// macOS).
#[derive(Debug)]
pub struct PlatformDirs {
    /// `config.ron` lives here.
    pub config_dir: PathBuf,
    /// JSON log files.
    pub log_dir: PathBuf,
}

const APP_NAME: &str = "geoid";

impl PlatformDirs {
    /// Resolve directories without creating them on disk.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::NoConfigDir`] if the OS does not expose a
    /// configuration directory.
    pub fn resolve() -> Result<Self, PlatformError> {
        let config_base = dirs::config_dir().ok_or(PlatformError::NoConfigDir)?;
        let app_dir = config_base.join(APP_NAME);
        let log_dir = dirs::state_dir()
            .map(|state| state.join(APP_NAME).join("logs"))
            .unwrap_or_else(|| app_dir.join("logs"));
        Ok(Self {
            config_dir: app_dir.join("config"),
            log_dir,
        })
    }

    /// Resolve directories rooted under a custom base path, such as the
    /// `--config` override.
    pub fn resolve_with_root(root: &Path) -> Self {
        Self {
            config_dir: root.to_path_buf(),
            log_dir: root.join("logs"),
        }
    }

    /// Create every directory on disk.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Io`] if any directory cannot be created.
    pub fn create_dirs(&self) -> Result<(), PlatformError> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}
