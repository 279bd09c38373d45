//! Caller-owned handle to the "current" trained model.
//!
//! The store pairs a model file path with the in-memory model last trained or
//! loaded from it. Training runs under a lock so concurrent train requests
//! cannot interleave their replace and persist steps; readers take an `Arc`
//! snapshot and keep predicting on it while a replacement trains.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ml::dataset::{Dataset, DatasetError, features_from_rows, matrix_to_rows};
use crate::ml::softmax::{
    ContractError, Hyperparameters, PersistError, SeedPolicy, SoftmaxRegression,
};

/// Errors surfaced by [`ModelStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No model in memory and none on disk.
    #[error("model not trained yet; train one first")]
    NotTrained,
    /// Request rows or labels failed validation.
    #[error(transparent)]
    Input(#[from] DatasetError),
    /// The classifier rejected the request.
    #[error(transparent)]
    Contract(#[from] ContractError),
    /// The persisted model could not be read.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Outcome of [`ModelStore::train`].
#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    /// Accuracy on the training rows.
    pub accuracy: f64,
    pub n_features: usize,
    pub n_classes: usize,
    /// False when the model was trained but writing it to disk failed.
    pub persisted: bool,
}

/// Train request body, `{ "x": [[..]], "y": [..] }` plus optional
/// `learning_rate`, `n_iter` and `reg_lambda`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrainRequest {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<usize>,
    #[serde(default)]
    pub learning_rate: Option<f64>,
    #[serde(default)]
    pub n_iter: Option<usize>,
    #[serde(default)]
    pub reg_lambda: Option<f64>,
}

impl TrainRequest {
    /// Requested hyperparameters, with defaults for omitted fields.
    pub fn hyperparameters(&self) -> Hyperparameters {
        let defaults = Hyperparameters::default();
        Hyperparameters {
            learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
            n_iter: self.n_iter.unwrap_or(defaults.n_iter),
            reg_lambda: self.reg_lambda.unwrap_or(defaults.reg_lambda),
        }
    }
}

/// Labels and class probabilities for a prediction batch.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    #[serde(rename = "y_pred")]
    pub labels: Vec<usize>,
    #[serde(rename = "probs")]
    pub probabilities: Vec<Vec<f64>>,
}

/// Holds the active model and the file it is persisted to.
#[derive(Debug)]
pub struct ModelStore {
    path: PathBuf,
    current: RwLock<Option<Arc<SoftmaxRegression>>>,
    train_lock: Mutex<()>,
}

impl ModelStore {
    /// Create a store for `path` without touching the filesystem.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(None),
            train_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the active model, if any.
    pub fn current(&self) -> Option<Arc<SoftmaxRegression>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install `model` as the active model without persisting it.
    pub fn replace(&self, model: SoftmaxRegression) -> Arc<SoftmaxRegression> {
        let model = Arc::new(model);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&model));
        model
    }

    /// Load the persisted model into memory.
    ///
    /// Returns `Ok(false)` when no model file exists yet.
    pub fn load_existing(&self) -> Result<bool, StoreError> {
        match SoftmaxRegression::load_from_file(&self.path) {
            Ok(model) => {
                self.replace(model);
                tracing::info!("Softmax model loaded from {}", self.path.display());
                Ok(true)
            }
            Err(err) if err.is_not_found() => {
                tracing::info!(
                    "No softmax model at {} yet; train one first",
                    self.path.display()
                );
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Validate `rows`/`labels`, then train as in [`Self::train_dataset`].
    pub fn train(
        &self,
        rows: &[Vec<f64>],
        labels: Vec<usize>,
        hyperparameters: Hyperparameters,
        seed: SeedPolicy,
    ) -> Result<TrainReport, StoreError> {
        let dataset = Dataset::new(rows, labels)?;
        self.train_dataset(&dataset, hyperparameters, seed)
    }

    /// Train from a request body; omitted hyperparameters use the defaults.
    pub fn train_request(
        &self,
        request: &TrainRequest,
        seed: SeedPolicy,
    ) -> Result<TrainReport, StoreError> {
        self.train(&request.x, request.y.clone(), request.hyperparameters(), seed)
    }

    /// Train a fresh model on `dataset`, make it current and persist it.
    ///
    /// `hyperparameters` are used as given. A failed write is logged and
    /// reported through [`TrainReport::persisted`]; the freshly trained model
    /// stays active either way.
    pub fn train_dataset(
        &self,
        dataset: &Dataset,
        hyperparameters: Hyperparameters,
        seed: SeedPolicy,
    ) -> Result<TrainReport, StoreError> {
        let mut model = SoftmaxRegression::try_new(hyperparameters)?.with_seed(seed);

        let _guard = self.train_lock.lock().unwrap_or_else(PoisonError::into_inner);
        model.try_fit(&dataset.features, &dataset.labels)?;
        let accuracy = model.try_accuracy(&dataset.features, &dataset.labels)?;
        let n_features = dataset.n_features();
        let n_classes = model.n_classes().ok_or(ContractError::NotTrained)?;

        let persisted = match model.save_to_file(&self.path) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Failed to save softmax model: {err}");
                false
            }
        };
        self.replace(model);
        tracing::info!(accuracy, n_features, n_classes, "Softmax model trained");
        Ok(TrainReport {
            accuracy,
            n_features,
            n_classes,
            persisted,
        })
    }

    /// Predict with the active model, loading it from disk on first use.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Prediction, StoreError> {
        let features = features_from_rows(rows)?;
        let model = match self.current() {
            Some(model) => model,
            None => {
                if !self.load_existing()? {
                    return Err(StoreError::NotTrained);
                }
                self.current().ok_or(StoreError::NotTrained)?
            }
        };
        let probs = model.try_predict_proba(&features)?;
        let labels = model.try_predict(&features)?;
        Ok(Prediction {
            labels,
            probabilities: matrix_to_rows(&probs),
        })
    }
}
