use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::atomic_write::write_atomic;

use super::{Hyperparameters, Parameters, PersistError, SeedPolicy, SoftmaxRegression};

/// Current revision of the on-disk model record.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Versioned on-disk representation of a trained classifier.
///
/// Weights are stored row-major, `n_features x n_classes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub format_version: u32,
    pub n_features: usize,
    pub n_classes: usize,
    pub hyperparameters: Hyperparameters,
    pub weights: Vec<f64>,
    pub bias: Vec<f64>,
}

impl ModelFile {
    /// Snapshot a trained model.
    pub fn from_model(model: &SoftmaxRegression) -> Result<Self, PersistError> {
        let params = model.params.as_ref().ok_or(PersistError::NotTrained)?;
        let file = Self {
            format_version: MODEL_FORMAT_VERSION,
            n_features: params.n_features(),
            n_classes: params.n_classes(),
            hyperparameters: model.hyperparameters,
            weights: params.weights.iter().copied().collect(),
            bias: params.bias.to_vec(),
        };
        file.validate()?;
        Ok(file)
    }

    /// Validate structural invariants of the record.
    pub fn validate(&self) -> Result<(), PersistError> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(PersistError::UnsupportedVersion {
                found: self.format_version,
                expected: MODEL_FORMAT_VERSION,
            });
        }
        if self.n_classes == 0 {
            return Err(PersistError::Invalid("n_classes must be > 0".to_string()));
        }
        let expected_weights = self.n_features.checked_mul(self.n_classes).ok_or_else(|| {
            PersistError::Invalid(format!(
                "{} x {} weights overflow",
                self.n_features, self.n_classes
            ))
        })?;
        if self.weights.len() != expected_weights {
            return Err(PersistError::Invalid(format!(
                "weights length {} does not match {} x {}",
                self.weights.len(),
                self.n_features,
                self.n_classes
            )));
        }
        if self.bias.len() != self.n_classes {
            return Err(PersistError::Invalid(format!(
                "bias length {} does not match n_classes {}",
                self.bias.len(),
                self.n_classes
            )));
        }
        if !self.weights.iter().chain(&self.bias).all(|v| v.is_finite()) {
            return Err(PersistError::Invalid("non-finite parameter".to_string()));
        }
        self.hyperparameters
            .validate()
            .map_err(|err| PersistError::Invalid(err.to_string()))
    }

    /// Rebuild a classifier from a validated record.
    pub fn into_model(self) -> Result<SoftmaxRegression, PersistError> {
        self.validate()?;
        let weights = Array2::from_shape_vec((self.n_features, self.n_classes), self.weights)
            .map_err(|err| PersistError::Invalid(err.to_string()))?;
        Ok(SoftmaxRegression {
            hyperparameters: self.hyperparameters,
            seed: SeedPolicy::default(),
            params: Some(Parameters {
                weights,
                bias: Array1::from(self.bias),
            }),
        })
    }
}

impl SoftmaxRegression {
    /// Write the trained parameters and hyperparameters to `path` as JSON.
    ///
    /// The record is written to a temporary file next to `path` and then moved
    /// over it, so a crash never leaves a half-written model behind.
    pub fn save_to_file(&self, path: &Path) -> Result<(), PersistError> {
        let file = ModelFile::from_model(self)?;
        let bytes = serde_json::to_vec_pretty(&file).map_err(PersistError::Serialize)?;
        write_atomic(path, &bytes).map_err(|source| PersistError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Saved softmax model to {}", path.display());
        Ok(())
    }

    /// Load a classifier previously written by [`Self::save_to_file`].
    pub fn load_from_file(path: &Path) -> Result<Self, PersistError> {
        let bytes = std::fs::read(path).map_err(|source| PersistError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ModelFile =
            serde_json::from_slice(&bytes).map_err(|source| PersistError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        file.into_model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;

    fn trained() -> SoftmaxRegression {
        let mut model = SoftmaxRegression::new(Hyperparameters {
            learning_rate: 0.05,
            n_iter: 300,
            reg_lambda: 1e-3,
        })
        .with_seed(SeedPolicy::Fixed(21));
        model.fit(
            &array![[-1.0, -1.2], [0.0, 1.0], [2.0, 2.1], [1.1, -0.3]],
            &[0, 1, 2, 1],
        );
        model
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("model.json");
        let model = trained();
        model.save_to_file(&path).unwrap();

        let loaded = SoftmaxRegression::load_from_file(&path).unwrap();
        let saved_bits: Vec<u64> = model.weights().unwrap().iter().map(|w| w.to_bits()).collect();
        let loaded_bits: Vec<u64> = loaded.weights().unwrap().iter().map(|w| w.to_bits()).collect();
        assert_eq!(saved_bits, loaded_bits);
        assert_eq!(model.bias(), loaded.bias());
        assert_eq!(model.hyperparameters(), loaded.hyperparameters());

        let batch = array![[0.3, 0.4], [-2.0, 5.0], [10.0, -10.0]];
        assert_eq!(model.predict_proba(&batch), loaded.predict_proba(&batch));
    }

    #[test]
    fn saving_untrained_model_is_an_error() {
        let dir = tempdir().unwrap();
        let model = SoftmaxRegression::new(Hyperparameters::default());
        let err = model.save_to_file(&dir.path().join("m.json")).unwrap_err();
        assert!(matches!(err, PersistError::NotTrained));
    }

    #[test]
    fn missing_file_is_recoverable() {
        let dir = tempdir().unwrap();
        let err = SoftmaxRegression::load_from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let err = SoftmaxRegression::load_from_file(&path).unwrap_err();
        assert!(matches!(err, PersistError::Parse { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn inconsistent_dimensions_are_rejected() {
        let mut file = ModelFile::from_model(&trained()).unwrap();
        file.weights.pop();
        assert!(matches!(file.clone().into_model(), Err(PersistError::Invalid(_))));

        let mut file = ModelFile::from_model(&trained()).unwrap();
        file.format_version = 99;
        assert!(matches!(
            file.into_model(),
            Err(PersistError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn huge_dimensions_are_an_error_not_a_panic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let json = format!(
            r#"{{"format_version":1,"n_features":{big},"n_classes":{big},
            "hyperparameters":{{"learning_rate":0.1,"n_iter":10,"reg_lambda":0.001}},
            "weights":[],"bias":[]}}"#,
            big = 1u64 << 32
        );
        std::fs::write(&path, json).unwrap();
        let err = SoftmaxRegression::load_from_file(&path).unwrap_err();
        assert!(matches!(err, PersistError::Invalid(_)));
    }

    #[test]
    fn non_finite_parameters_are_rejected() {
        let mut file = ModelFile::from_model(&trained()).unwrap();
        file.weights[0] = f64::NAN;
        assert!(matches!(file.into_model(), Err(PersistError::Invalid(_))));

        let mut file = ModelFile::from_model(&trained()).unwrap();
        file.bias[1] = f64::INFINITY;
        assert!(matches!(file.into_model(), Err(PersistError::Invalid(_))));
    }

    #[test]
    fn stored_hyperparameters_are_range_checked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut file = ModelFile::from_model(&trained()).unwrap();
        file.hyperparameters.learning_rate = -0.5;
        std::fs::write(&path, serde_json::to_vec(&file).unwrap()).unwrap();
        let err = SoftmaxRegression::load_from_file(&path).unwrap_err();
        assert!(matches!(err, PersistError::Invalid(msg) if msg.contains("learning_rate")));
    }
}
