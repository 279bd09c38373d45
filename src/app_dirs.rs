//! Location of the `.softreg` folder holding config, logs and trained models.
//!
//! The folder lives under the OS config directory (`%APPDATA%` on Windows,
//! `~/.config` on Linux) unless `SOFTREG_HOME` names another base directory.
//! Models default to `.softreg/models/`; see [`crate::config`].

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use thiserror::Error;

/// Folder created under the base directory.
pub const APP_DIR_NAME: &str = ".softreg";
/// Environment variable that replaces the OS config directory as the base.
pub const HOME_ENV_VAR: &str = "SOFTREG_HOME";

const LOGS_DIR: &str = "logs";

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("Cannot locate a config directory; set SOFTREG_HOME")]
    NoBaseDir,
    #[error("Failed to create directory {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Directory layout rooted at one `.softreg` folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    root: PathBuf,
}

impl AppDirs {
    /// Layout under `base`, i.e. `base/.softreg`.
    pub fn under(base: impl AsRef<Path>) -> Self {
        Self {
            root: base.as_ref().join(APP_DIR_NAME),
        }
    }

    /// Layout under `SOFTREG_HOME`, falling back to the OS config directory.
    pub fn from_env() -> Result<Self, AppDirError> {
        match std::env::var_os(HOME_ENV_VAR) {
            Some(base) if !base.is_empty() => Ok(Self::under(PathBuf::from(base))),
            _ => BaseDirs::new()
                .map(|dirs| Self::under(dirs.config_dir()))
                .ok_or(AppDirError::NoBaseDir),
        }
    }

    /// The `.softreg` folder, created if missing.
    pub fn root(&self) -> Result<PathBuf, AppDirError> {
        create(self.root.clone())
    }

    pub fn logs(&self) -> Result<PathBuf, AppDirError> {
        create(self.root.join(LOGS_DIR))
    }
}

/// Return the `.softreg` folder, creating it if needed.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    AppDirs::from_env()?.root()
}

/// Return `.softreg/logs`, creating it if needed.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    AppDirs::from_env()?.logs()
}

fn create(path: PathBuf) -> Result<PathBuf, AppDirError> {
    match std::fs::create_dir_all(&path) {
        Ok(()) => Ok(path),
        Err(source) => Err(AppDirError::Create { path, source }),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::HomeGuard;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_is_nested_under_base() {
        let base = tempdir().unwrap();
        let dirs = AppDirs::under(base.path());
        let root = base.path().join(APP_DIR_NAME);
        assert_eq!(dirs.root().unwrap(), root);
        assert_eq!(dirs.logs().unwrap(), root.join("logs"));
        assert!(root.join("logs").is_dir());
    }

    #[test]
    fn home_variable_moves_the_root() {
        let base = tempdir().unwrap();
        let _guard = HomeGuard::set(base.path());
        let root = app_root_dir().unwrap();
        assert_eq!(root, base.path().join(APP_DIR_NAME));
        assert!(root.is_dir());
        assert_eq!(logs_dir().unwrap(), root.join("logs"));
    }

    #[test]
    fn creating_under_a_file_fails() {
        let base = tempdir().unwrap();
        let blocker = base.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let err = AppDirs::under(&blocker).root().unwrap_err();
        assert!(matches!(err, AppDirError::Create { .. }));
    }
}
