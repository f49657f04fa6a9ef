//! Unified path management for chatwire files.
//!
//! Everything lives under one platform config directory, resolved with
//! `dirs` (XDG on Linux, `~/Library/Application Support` on macOS,
//! `%APPDATA%` on Windows).

use std::path::{Path, PathBuf};

use chatwire_core::ChatwireError;
use thiserror::Error;

/// Errors that can occur during path resolution.
#[derive(Debug, Error)]
pub enum PathError {
    /// Platform config directory could not be determined.
    #[error("Cannot find config directory")]
    ConfigDirNotFound,
}

impl From<PathError> for ChatwireError {
    fn from(e: PathError) -> Self {
        ChatwireError::config(e.to_string())
    }
}

/// Path layout for chatwire.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/chatwire/          # Root (platform config dir + "chatwire")
/// ├── config.toml              # Client configuration
/// ├── session.toml             # Persisted chat_session_id
/// └── logs/                    # Application logs
///     └── chatwire.log.YYYY-MM-DD
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatwirePaths {
    root: PathBuf,
}

impl ChatwirePaths {
    const APP_DIR: &'static str = "chatwire";

    /// Resolves the platform config directory.
    pub fn resolve() -> Result<Self, PathError> {
        let base = dirs::config_dir().ok_or(PathError::ConfigDirNotFound)?;
        Ok(Self {
            root: base.join(Self::APP_DIR),
        })
    }

    /// Uses `root` as the chatwire directory (tests, `--config-dir`).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn config_dir(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn session_file(&self) -> PathBuf {
        self.root.join("session.toml")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_ends_with_app_dir() {
        if let Ok(paths) = ChatwirePaths::resolve() {
            assert!(paths.config_dir().ends_with("chatwire"));
        }
    }

    #[test]
    fn test_files_live_under_root() {
        let paths = ChatwirePaths::with_root("/tmp/chatwire-test");
        assert!(paths.config_file().ends_with("config.toml"));
        assert!(paths.session_file().ends_with("session.toml"));
        assert!(paths.logs_dir().ends_with("logs"));
        for path in [paths.config_file(), paths.session_file(), paths.logs_dir()] {
            assert!(path.starts_with(paths.config_dir()));
        }
    }
}
