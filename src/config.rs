//! TOML configuration stored as `softreg.toml` in the app root.
//!
//! ```toml
//! [training]
//! learning_rate = 0.1
//! n_iter = 2000
//! reg_lambda = 0.001
//! seed = 42          # optional; omit for a fresh random initialization
//!
//! [model]
//! path = "models/softmax_model.json"
//! ```
//!
//! Missing files and missing keys fall back to the defaults above.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs::{self, AppDirError};
use crate::atomic_write::write_atomic;
use crate::ml::softmax::{
    ContractError, DEFAULT_LEARNING_RATE, DEFAULT_N_ITER, DEFAULT_REG_LAMBDA, Hyperparameters,
    SeedPolicy,
};

/// File name of the settings file inside the app root.
pub const CONFIG_FILE_NAME: &str = "softreg.toml";
/// Default model location, relative to the app root.
pub const DEFAULT_MODEL_PATH: &str = "models/softmax_model.json";

/// Errors that may occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The app root could not be resolved or created.
    #[error(transparent)]
    AppDir(#[from] AppDirError),
    /// Failed to read the config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write the config file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse TOML.
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to serialize config to TOML.
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    /// Parsed training settings are out of range.
    #[error("Invalid training settings in {path}: {source}")]
    InvalidTraining {
        path: PathBuf,
        source: ContractError,
    },
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub training: TrainingConfig,
    pub model: ModelConfig,
}

/// `[training]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub n_iter: usize,
    pub reg_lambda: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            n_iter: DEFAULT_N_ITER,
            reg_lambda: DEFAULT_REG_LAMBDA,
            seed: None,
        }
    }
}

impl TrainingConfig {
    pub fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            learning_rate: self.learning_rate,
            n_iter: self.n_iter,
            reg_lambda: self.reg_lambda,
        }
    }

    pub fn seed_policy(&self) -> SeedPolicy {
        self.seed.map_or(SeedPolicy::Entropy, SeedPolicy::Fixed)
    }
}

/// `[model]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model file; relative paths are resolved against the app root.
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MODEL_PATH),
        }
    }
}

impl Config {
    /// Resolve the model path against `root` unless it is already absolute.
    pub fn model_path_in(&self, root: &Path) -> PathBuf {
        if self.model.path.is_absolute() {
            self.model.path.clone()
        } else {
            root.join(&self.model.path)
        }
    }

    /// Resolve the model path against the app root.
    pub fn model_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.model_path_in(&app_dirs::app_root_dir()?))
    }
}

/// Path of `softreg.toml`, creating the app root if needed.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load `softreg.toml` from the app root, or defaults if it does not exist.
pub fn load_or_default() -> Result<Config, ConfigError> {
    load_from(&config_path()?)
}

/// Load a config file, returning defaults if `path` does not exist.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    config
        .training
        .hyperparameters()
        .validate()
        .map_err(|source| ConfigError::InvalidTraining {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(config)
}

/// Write `config` to `path` atomically.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let text = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, text.as_bytes()).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
