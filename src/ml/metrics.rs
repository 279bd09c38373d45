//! Evaluation metrics for the softmax classifier.

use ndarray::{Array2, Axis};

use crate::ml::softmax::{ContractError, SoftmaxRegression};

/// Confusion matrix for a `K`-class classifier; rows are ground truth,
/// columns are predictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: Array2<u32>,
}

impl ConfusionMatrix {
    pub fn new(n_classes: usize) -> Self {
        Self {
            counts: Array2::zeros((n_classes, n_classes)),
        }
    }

    /// Tally `truth`/`predicted` pairs, skipping any outside `0..K`.
    pub fn from_pairs(n_classes: usize, truth: &[usize], predicted: &[usize]) -> Self {
        let mut cm = Self::new(n_classes);
        for (&t, &p) in truth.iter().zip(predicted) {
            cm.add(t, p);
        }
        cm
    }

    pub fn n_classes(&self) -> usize {
        self.counts.nrows()
    }

    /// Count one prediction; pairs outside `0..K` are ignored.
    pub fn add(&mut self, truth: usize, predicted: usize) {
        if let Some(cell) = self.counts.get_mut((truth, predicted)) {
            *cell = cell.saturating_add(1);
        }
    }

    /// Count at `(truth, predicted)`, zero when out of range.
    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts.get((truth, predicted)).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// Number of predictions on the diagonal.
    pub fn correct(&self) -> u64 {
        self.counts.diag().iter().map(|&c| u64::from(c)).sum()
    }
}

/// Precision/recall statistics for a single class.
#[derive(Debug, Clone, PartialEq)]
pub struct PerClassStats {
    /// `TP / (TP + FP)`, zero when the class was never predicted.
    pub precision: f64,
    /// `TP / (TP + FN)`, zero when the class has no true examples.
    pub recall: f64,
    /// Number of true examples of the class.
    pub support: u32,
}

impl PerClassStats {
    pub fn f1(&self) -> f64 {
        let denom = self.precision + self.recall;
        if denom == 0.0 {
            0.0
        } else {
            2.0 * self.precision * self.recall / denom
        }
    }
}

/// Per-class precision and recall, indexed by class.
pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    let actual = cm.counts.map(|&c| u64::from(c)).sum_axis(Axis(1));
    let predicted = cm.counts.map(|&c| u64::from(c)).sum_axis(Axis(0));
    (0..cm.n_classes())
        .map(|class| {
            let tp = cm.get(class, class) as f64;
            PerClassStats {
                precision: ratio(tp, predicted[class] as f64),
                recall: ratio(tp, actual[class] as f64),
                support: u32::try_from(actual[class]).unwrap_or(u32::MAX),
            }
        })
        .collect()
}

/// Fraction of counted predictions on the diagonal; zero for an empty matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    ratio(cm.correct() as f64, cm.total() as f64)
}

fn ratio(num: f64, denom: f64) -> f64 {
    if denom == 0.0 { 0.0 } else { num / denom }
}

/// Accuracy, confusion matrix and per-class stats for one labeled batch.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
    pub per_class: Vec<PerClassStats>,
}

/// Evaluate a trained model against ground-truth labels.
///
/// Labels at or above the model's class count are counted as misses in the
/// accuracy but do not appear in the confusion matrix.
pub fn evaluate(
    model: &SoftmaxRegression,
    features: &Array2<f64>,
    labels: &[usize],
) -> Result<Evaluation, ContractError> {
    let accuracy = model.try_accuracy(features, labels)?;
    let predicted = model.try_predict(features)?;
    let n_classes = model.n_classes().ok_or(ContractError::NotTrained)?;
    let confusion = ConfusionMatrix::from_pairs(n_classes, labels, &predicted);
    let per_class = precision_recall_by_class(&confusion);
    Ok(Evaluation {
        accuracy,
        confusion,
        per_class,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::softmax::{Hyperparameters, SeedPolicy};
    use ndarray::array;

    fn sample_matrix() -> ConfusionMatrix {
        ConfusionMatrix::from_pairs(2, &[0, 0, 0, 1], &[0, 0, 1, 1])
    }

    #[test]
    fn precision_and_recall_from_counts() {
        let stats = precision_recall_by_class(&sample_matrix());
        assert_eq!(stats[0].support, 3);
        assert!((stats[0].precision - 1.0).abs() < 1e-12);
        assert!((stats[0].recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((stats[1].precision - 0.5).abs() < 1e-12);
        assert!((stats[1].f1() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn accuracy_counts_diagonal() {
        assert!((accuracy(&sample_matrix()) - 0.75).abs() < 1e-12);
        assert_eq!(accuracy(&ConfusionMatrix::new(3)), 0.0);
    }

    #[test]
    fn out_of_range_pairs_are_ignored() {
        let mut cm = ConfusionMatrix::new(2);
        cm.add(2, 0);
        cm.add(0, 5);
        assert_eq!(cm.total(), 0);
        assert_eq!(cm.get(2, 0), 0);
    }

    #[test]
    fn evaluate_matches_model_accuracy() {
        let x = array![[-1.0, -1.0], [-0.9, -1.1], [1.0, 1.0], [1.1, 0.9]];
        let y = [0, 0, 1, 1];
        let mut model = SoftmaxRegression::new(Hyperparameters {
            learning_rate: 0.5,
            n_iter: 300,
            reg_lambda: 1e-3,
        })
        .with_seed(SeedPolicy::Fixed(8));
        model.fit(&x, &y);

        let eval = evaluate(&model, &x, &y).unwrap();
        assert_eq!(eval.accuracy, 1.0);
        assert_eq!(eval.confusion.correct(), 4);
        assert_eq!(eval.per_class.len(), 2);
        assert!(eval.per_class.iter().all(|s| s.f1() == 1.0));
    }
}
