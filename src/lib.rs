//! Library exports for reuse in the CLIs, benchmarks and tests.
/// Application directory helpers.
pub mod app_dirs;
pub(crate) mod atomic_write;
/// TOML settings for training defaults and the model location.
pub mod config;
/// Tracing subscriber setup.
pub mod logging;
/// Softmax regression, datasets, metrics and the model store.
pub mod ml;

pub use ml::dataset::{Dataset, DatasetError, DatasetFile};
pub use ml::softmax::{ContractError, Hyperparameters, PersistError, SeedPolicy, SoftmaxRegression};
pub use ml::store::{ModelStore, Prediction, StoreError, TrainReport, TrainRequest};
