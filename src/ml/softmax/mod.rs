//! Multinomial logistic (softmax) regression trained by full-batch gradient descent.
//!
//! The classifier owns a `(n_features x n_classes)` weight matrix and a bias vector.
//! Parameters are allocated by the first call to [`SoftmaxRegression::fit`] and
//! updated in place by every later call, so training can be continued.
//!
//! Caller mistakes (shape mismatches, empty input, inference before training) are
//! contract violations: the plain methods panic, the `try_*` methods return a
//! [`ContractError`]. Persistence failures are always returned as [`PersistError`].

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

mod errors;
mod persist;
mod train;

pub use errors::{ContractError, PersistError};
pub use persist::{MODEL_FORMAT_VERSION, ModelFile};

/// Default learning rate used when none is configured.
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;
/// Default number of gradient-descent iterations.
pub const DEFAULT_N_ITER: usize = 2000;
/// Default L2 regularization strength.
pub const DEFAULT_REG_LAMBDA: f64 = 1e-3;

/// Scale applied to standard-normal draws when initializing weights.
const INIT_WEIGHT_SCALE: f64 = 0.01;

/// Training hyperparameters, fixed when the classifier is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Gradient-descent step size.
    pub learning_rate: f64,
    /// Number of full-batch iterations per `fit` call.
    pub n_iter: usize,
    /// L2 penalty on the weights; `0.0` disables it. The bias is never penalized.
    pub reg_lambda: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            n_iter: DEFAULT_N_ITER,
            reg_lambda: DEFAULT_REG_LAMBDA,
        }
    }
}

impl Hyperparameters {
    /// Check ranges: positive finite learning rate, non-negative finite lambda.
    pub fn validate(&self) -> Result<(), ContractError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ContractError::InvalidHyperparameter {
                name: "learning_rate",
                value: self.learning_rate.to_string(),
            });
        }
        if !self.reg_lambda.is_finite() || self.reg_lambda < 0.0 {
            return Err(ContractError::InvalidHyperparameter {
                name: "reg_lambda",
                value: self.reg_lambda.to_string(),
            });
        }
        Ok(())
    }
}

/// Source of randomness for weight initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeedPolicy {
    /// Fresh OS entropy on every initialization.
    #[default]
    Entropy,
    /// Deterministic initialization from a fixed seed.
    Fixed(u64),
}

impl SeedPolicy {
    fn rng(self) -> StdRng {
        match self {
            SeedPolicy::Entropy => StdRng::from_os_rng(),
            SeedPolicy::Fixed(seed) => StdRng::seed_from_u64(seed),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Parameters {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl Parameters {
    fn initialize(n_features: usize, n_classes: usize, rng: &mut StdRng) -> Self {
        let weights = Array2::from_shape_simple_fn((n_features, n_classes), || {
            INIT_WEIGHT_SCALE * rng.sample::<f64, _>(StandardNormal)
        });
        Self {
            weights,
            bias: Array1::zeros(n_classes),
        }
    }

    fn n_features(&self) -> usize {
        self.weights.nrows()
    }

    fn n_classes(&self) -> usize {
        self.weights.ncols()
    }

    /// `softmax(features . W + b)`, one row per sample.
    fn probabilities(&self, features: &Array2<f64>) -> Array2<f64> {
        let mut scores = features.dot(&self.weights);
        scores += &self.bias;
        softmax_rows(scores)
    }
}

/// Softmax regression classifier.
#[derive(Debug, Clone)]
pub struct SoftmaxRegression {
    hyperparameters: Hyperparameters,
    seed: SeedPolicy,
    params: Option<Parameters>,
}

impl SoftmaxRegression {
    /// Create an untrained classifier.
    ///
    /// # Panics
    ///
    /// Panics if the hyperparameters are out of range; see [`Self::try_new`].
    pub fn new(hyperparameters: Hyperparameters) -> Self {
        Self::try_new(hyperparameters)
            .unwrap_or_else(|err| panic!("SoftmaxRegression::new: {err}"))
    }

    /// Create an untrained classifier, rejecting out-of-range hyperparameters.
    pub fn try_new(hyperparameters: Hyperparameters) -> Result<Self, ContractError> {
        hyperparameters.validate()?;
        Ok(Self {
            hyperparameters,
            seed: SeedPolicy::default(),
            params: None,
        })
    }

    /// Use `seed` for weight initialization.
    pub fn with_seed(mut self, seed: SeedPolicy) -> Self {
        self.seed = seed;
        self
    }

    /// Hyperparameters the model was built with.
    pub fn hyperparameters(&self) -> Hyperparameters {
        self.hyperparameters
    }

    /// How the next fit initializes its weights.
    pub fn seed_policy(&self) -> SeedPolicy {
        self.seed
    }

    /// True once parameters exist (after `fit` or a load).
    pub fn is_trained(&self) -> bool {
        self.params.is_some()
    }

    /// Feature count of the fitted weights, or `None` before training.
    pub fn n_features(&self) -> Option<usize> {
        self.params.as_ref().map(Parameters::n_features)
    }

    /// Class count of the fitted weights, or `None` before training.
    pub fn n_classes(&self) -> Option<usize> {
        self.params.as_ref().map(Parameters::n_classes)
    }

    /// Copy of the weight matrix, `(n_features x n_classes)`.
    pub fn weights(&self) -> Option<Array2<f64>> {
        self.params.as_ref().map(|params| params.weights.clone())
    }

    /// Copy of the bias vector.
    pub fn bias(&self) -> Option<Array1<f64>> {
        self.params.as_ref().map(|params| params.bias.clone())
    }

    /// Train on `features` and `labels`, running exactly `n_iter` iterations.
    ///
    /// # Panics
    ///
    /// Panics on any [`ContractError`]; parameters are left untouched in that case.
    pub fn fit(&mut self, features: &Array2<f64>, labels: &[usize]) {
        if let Err(err) = self.try_fit(features, labels) {
            panic!("fit: {err}");
        }
    }

    /// Class probabilities, `(n_samples x n_classes)`.
    ///
    /// # Panics
    ///
    /// Panics if the model is untrained or the feature count is wrong.
    pub fn predict_proba(&self, features: &Array2<f64>) -> Array2<f64> {
        self.try_predict_proba(features)
            .unwrap_or_else(|err| panic!("predict_proba: {err}"))
    }

    pub fn try_predict_proba(
        &self,
        features: &Array2<f64>,
    ) -> Result<Array2<f64>, ContractError> {
        let params = self.params.as_ref().ok_or(ContractError::NotTrained)?;
        check_feature_count(params, features)?;
        Ok(params.probabilities(features))
    }

    /// Most probable class per row; ties go to the lowest class index.
    ///
    /// # Panics
    ///
    /// Panics if the model is untrained or the feature count is wrong.
    pub fn predict(&self, features: &Array2<f64>) -> Vec<usize> {
        self.try_predict(features)
            .unwrap_or_else(|err| panic!("predict: {err}"))
    }

    pub fn try_predict(&self, features: &Array2<f64>) -> Result<Vec<usize>, ContractError> {
        let probs = self.try_predict_proba(features)?;
        Ok(probs.rows().into_iter().map(argmax).collect())
    }

    /// Fraction of rows whose predicted label equals the ground truth.
    ///
    /// # Panics
    ///
    /// Panics if the model is untrained, the batch is empty, or lengths differ.
    pub fn accuracy(&self, features: &Array2<f64>, labels: &[usize]) -> f64 {
        self.try_accuracy(features, labels)
            .unwrap_or_else(|err| panic!("accuracy: {err}"))
    }

    pub fn try_accuracy(
        &self,
        features: &Array2<f64>,
        labels: &[usize],
    ) -> Result<f64, ContractError> {
        let predicted = self.try_predict(features)?;
        if predicted.len() != labels.len() {
            return Err(ContractError::LengthMismatch {
                what: "labels",
                expected: predicted.len(),
                got: labels.len(),
            });
        }
        if labels.is_empty() {
            return Err(ContractError::EmptyInput);
        }
        let correct = predicted
            .iter()
            .zip(labels)
            .filter(|(pred, truth)| pred == truth)
            .count();
        Ok(correct as f64 / labels.len() as f64)
    }

    /// Mean cross-entropy of the true labels plus `lambda / 2 * |W|^2`.
    pub fn cross_entropy(
        &self,
        features: &Array2<f64>,
        labels: &[usize],
    ) -> Result<f64, ContractError> {
        let params = self.params.as_ref().ok_or(ContractError::NotTrained)?;
        check_feature_count(params, features)?;
        check_labels(params.n_classes(), features.nrows(), labels)?;
        if labels.is_empty() {
            return Err(ContractError::EmptyInput);
        }
        let probs = params.probabilities(features);
        Ok(train::regularized_loss(
            &probs,
            labels,
            &params.weights,
            self.hyperparameters.reg_lambda,
        ))
    }
}

/// Row-wise softmax with max subtraction so large scores cannot overflow.
pub fn softmax_rows(mut scores: Array2<f64>) -> Array2<f64> {
    for mut row in scores.rows_mut() {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|score| (score - max).exp());
        let sum = row.sum();
        row /= sum;
    }
    scores
}

fn argmax(values: ArrayView1<'_, f64>) -> usize {
    let mut best_idx = 0usize;
    let mut best_val = f64::NEG_INFINITY;
    for (idx, &value) in values.iter().enumerate() {
        if value > best_val {
            best_val = value;
            best_idx = idx;
        }
    }
    best_idx
}

fn check_feature_count(params: &Parameters, features: &Array2<f64>) -> Result<(), ContractError> {
    if features.ncols() != params.n_features() {
        return Err(ContractError::FeatureMismatch {
            expected: params.n_features(),
            got: features.ncols(),
        });
    }
    Ok(())
}

fn check_labels(n_classes: usize, n_samples: usize, labels: &[usize]) -> Result<(), ContractError> {
    if labels.len() != n_samples {
        return Err(ContractError::LengthMismatch {
            what: "labels",
            expected: n_samples,
            got: labels.len(),
        });
    }
    if let Some(&label) = labels.iter().find(|&&label| label >= n_classes) {
        return Err(ContractError::LabelOutOfRange { label, n_classes });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn naive_softmax(row: &[f64]) -> Vec<f64> {
        let exps: Vec<f64> = row.iter().map(|v| v.exp()).collect();
        let sum: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    }

    fn trained_on_toy() -> SoftmaxRegression {
        let features = array![[-1.0, -1.0], [0.0, 1.0], [2.0, 2.0]];
        let mut model = SoftmaxRegression::new(Hyperparameters {
            learning_rate: 0.1,
            n_iter: 200,
            reg_lambda: 0.0,
        })
        .with_seed(SeedPolicy::Fixed(7));
        model.fit(&features, &[0, 1, 2]);
        model
    }

    #[test]
    fn softmax_matches_naive_on_small_scores() {
        let scores = array![[0.5, -1.0, 2.0], [0.0, 0.0, 0.0]];
        let out = softmax_rows(scores.clone());
        for (row, out_row) in scores.rows().into_iter().zip(out.rows()) {
            let expected = naive_softmax(row.as_slice().unwrap());
            for (a, b) in out_row.iter().zip(expected) {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn softmax_is_shift_invariant() {
        let base = array![[0.3, -2.0, 1.7, 0.0]];
        let shifted = &base + 1234.5;
        let a = softmax_rows(base);
        let b = softmax_rows(shifted);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn softmax_survives_huge_scores() {
        let out = softmax_rows(array![[1000.0, 999.0, -1000.0], [-800.0, -801.0, -900.0]]);
        for row in out.rows() {
            assert!(row.iter().all(|p| p.is_finite() && (0.0..=1.0).contains(p)));
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!(out[[0, 0]] > out[[0, 1]]);
    }

    #[test]
    fn argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax(array![0.25, 0.5, 0.25, 0.5].view()), 1);
        assert_eq!(argmax(array![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0].view()), 0);
    }

    #[test]
    fn untrained_model_reports_not_trained() {
        let model = SoftmaxRegression::new(Hyperparameters::default());
        let features = array![[1.0, 2.0]];
        assert!(!model.is_trained());
        assert_eq!(
            model.try_predict_proba(&features),
            Err(ContractError::NotTrained)
        );
        assert_eq!(model.try_predict(&features), Err(ContractError::NotTrained));
        assert!(model.weights().is_none());
    }

    #[test]
    #[should_panic(expected = "not trained")]
    fn predict_proba_panics_when_untrained() {
        let model = SoftmaxRegression::new(Hyperparameters::default());
        model.predict_proba(&array![[0.0]]);
    }

    #[test]
    fn rejects_invalid_hyperparameters() {
        let bad_lr = Hyperparameters {
            learning_rate: 0.0,
            ..Hyperparameters::default()
        };
        assert!(matches!(
            SoftmaxRegression::try_new(bad_lr),
            Err(ContractError::InvalidHyperparameter { name: "learning_rate", .. })
        ));
        let bad_lambda = Hyperparameters {
            reg_lambda: -1.0,
            ..Hyperparameters::default()
        };
        assert!(matches!(
            SoftmaxRegression::try_new(bad_lambda),
            Err(ContractError::InvalidHyperparameter { name: "reg_lambda", .. })
        ));
    }

    #[test]
    fn returned_weights_are_independent_copies() {
        let model = trained_on_toy();
        let mut copy = model.weights().unwrap();
        copy.fill(42.0);
        assert_ne!(model.weights().unwrap(), copy);
    }

    #[test]
    fn predict_rejects_wrong_feature_count() {
        let model = trained_on_toy();
        assert_eq!(
            model.try_predict(&array![[1.0, 2.0, 3.0]]),
            Err(ContractError::FeatureMismatch {
                expected: 2,
                got: 3
            })
        );
    }

    #[test]
    fn accuracy_rejects_length_mismatch() {
        let model = trained_on_toy();
        let features = array![[-1.0, -1.0], [0.0, 1.0]];
        assert!(matches!(
            model.try_accuracy(&features, &[0]),
            Err(ContractError::LengthMismatch { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "length mismatch")]
    fn accuracy_panics_on_length_mismatch() {
        let model = trained_on_toy();
        model.accuracy(&array![[-1.0, -1.0]], &[0, 1]);
    }
}
