use ndarray::{Array2, Axis};

use super::{
    ContractError, Hyperparameters, Parameters, SoftmaxRegression, check_feature_count, check_labels,
};

/// Iterations between loss traces when `trace` logging is enabled.
const LOSS_TRACE_INTERVAL: usize = 200;

impl SoftmaxRegression {
    /// Train without panicking; see [`SoftmaxRegression::fit`].
    ///
    /// All checks run before any parameter is allocated or updated, so a
    /// rejected call leaves a previously trained model exactly as it was.
    pub fn try_fit(
        &mut self,
        features: &Array2<f64>,
        labels: &[usize],
    ) -> Result<(), ContractError> {
        let (n_samples, n_features) = features.dim();
        if n_samples == 0 {
            return Err(ContractError::EmptyInput);
        }
        if labels.len() != n_samples {
            return Err(ContractError::LengthMismatch {
                what: "labels",
                expected: n_samples,
                got: labels.len(),
            });
        }
        let max_label = labels.iter().copied().max().unwrap_or(0);
        let observed_classes = max_label
            .checked_add(1)
            .ok_or(ContractError::LabelTooLarge { label: max_label })?;
        if let Some(params) = &self.params {
            check_feature_count(params, features)?;
            check_labels(params.n_classes(), n_samples, labels)?;
        }

        let seed = self.seed;
        let params = self.params.get_or_insert_with(|| {
            Parameters::initialize(n_features, observed_classes, &mut seed.rng())
        });
        tracing::debug!(
            n_samples,
            n_features,
            n_classes = params.n_classes(),
            learning_rate = self.hyperparameters.learning_rate,
            n_iter = self.hyperparameters.n_iter,
            reg_lambda = self.hyperparameters.reg_lambda,
            "Softmax training started"
        );
        gradient_descent(params, features, labels, &self.hyperparameters);
        tracing::debug!(n_iter = self.hyperparameters.n_iter, "Softmax training finished");
        Ok(())
    }
}

fn gradient_descent(
    params: &mut Parameters,
    features: &Array2<f64>,
    labels: &[usize],
    hp: &Hyperparameters,
) {
    let n_samples = features.nrows();
    let onehot = one_hot(labels, params.n_classes());
    let inv_n = 1.0 / n_samples as f64;
    let features_t = features.t();

    for iter in 0..hp.n_iter {
        let probs = params.probabilities(features);
        if iter % LOSS_TRACE_INTERVAL == 0 && tracing::enabled!(tracing::Level::TRACE) {
            let loss = regularized_loss(&probs, labels, &params.weights, hp.reg_lambda);
            tracing::trace!(iter, loss, "Softmax training loss");
        }

        // Cross-entropy gradient w.r.t. the scores, averaged over the batch.
        let mut d_scores = probs - &onehot;
        d_scores *= inv_n;

        let mut d_weights = features_t.dot(&d_scores);
        if hp.reg_lambda > 0.0 {
            d_weights.scaled_add(hp.reg_lambda, &params.weights);
        }
        let d_bias = d_scores.sum_axis(Axis(0));

        params.weights.scaled_add(-hp.learning_rate, &d_weights);
        params.bias.scaled_add(-hp.learning_rate, &d_bias);
    }
}

fn one_hot(labels: &[usize], n_classes: usize) -> Array2<f64> {
    let mut out = Array2::zeros((labels.len(), n_classes));
    for (row, &label) in labels.iter().enumerate() {
        out[[row, label]] = 1.0;
    }
    out
}

pub(super) fn regularized_loss(
    probs: &Array2<f64>,
    labels: &[usize],
    weights: &Array2<f64>,
    reg_lambda: f64,
) -> f64 {
    let nll: f64 = labels
        .iter()
        .enumerate()
        .map(|(row, &label)| -probs[[row, label]].max(f64::MIN_POSITIVE).ln())
        .sum();
    let penalty = 0.5 * reg_lambda * weights.iter().map(|w| w * w).sum::<f64>();
    nll / labels.len() as f64 + penalty
}
