//! Feature/label ingestion boundary.
//!
//! Callers hand over nested rows (as they arrive from JSON); this module checks
//! that the table is non-empty, rectangular and finite, and that labels stay
//! below [`MAX_CLASSES`], before building the `ndarray` matrix the classifier
//! consumes.

use std::path::{Path, PathBuf};

use ndarray::{Array2, array};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on the class count accepted from untrusted label arrays.
///
/// Labels index class slots directly, so a label `l` allocates `l + 1` columns.
pub const MAX_CLASSES: usize = 4096;

/// Errors raised while validating or reading a feature table.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The feature table has no rows.
    #[error("X must not be empty")]
    Empty,
    /// A row has a different column count than the first row.
    #[error("row {row} has {got} columns, expected {expected}")]
    RaggedRow {
        /// Zero-based row index.
        row: usize,
        /// Column count of the first row.
        expected: usize,
        /// Column count of the offending row.
        got: usize,
    },
    /// A feature is NaN or infinite.
    #[error("non-finite feature at row {row}, column {col}")]
    NonFinite {
        /// Zero-based row index.
        row: usize,
        /// Zero-based column index.
        col: usize,
    },
    /// Row and label counts differ.
    #[error("X has {samples} rows but y has {labels} labels")]
    LabelCount {
        /// Number of feature rows.
        samples: usize,
        /// Number of labels.
        labels: usize,
    },
    /// A label would need more than [`MAX_CLASSES`] class slots.
    #[error("label {label} at row {row} exceeds the maximum class index {max}")]
    LabelTooLarge {
        /// Zero-based row index.
        row: usize,
        /// Offending label.
        label: usize,
        /// Largest accepted label.
        max: usize,
    },
    /// Failed to read a dataset file.
    #[error("Failed to read dataset {path}: {source}")]
    Read {
        /// Dataset file path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to parse a dataset file.
    #[error("Invalid dataset {path}: {source}")]
    Parse {
        /// Dataset file path.
        path: PathBuf,
        /// JSON parse error.
        source: serde_json::Error,
    },
}

/// Build a `(rows x columns)` matrix from nested rows.
pub fn features_from_rows(rows: &[Vec<f64>]) -> Result<Array2<f64>, DatasetError> {
    let first = rows.first().ok_or(DatasetError::Empty)?;
    let n_features = first.len();
    for (row_idx, row) in rows.iter().enumerate() {
        if row.len() != n_features {
            return Err(DatasetError::RaggedRow {
                row: row_idx,
                expected: n_features,
                got: row.len(),
            });
        }
        if let Some(col) = row.iter().position(|v| !v.is_finite()) {
            return Err(DatasetError::NonFinite { row: row_idx, col });
        }
    }
    Ok(Array2::from_shape_fn((rows.len(), n_features), |(row, col)| {
        rows[row][col]
    }))
}

/// Copy a matrix back into nested rows.
pub fn matrix_to_rows(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.rows().into_iter().map(|row| row.to_vec()).collect()
}

/// Validated features with aligned labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub features: Array2<f64>,
    pub labels: Vec<usize>,
}

impl Dataset {
    /// Validate `rows` and check that every row has exactly one label below
    /// [`MAX_CLASSES`].
    pub fn new(rows: &[Vec<f64>], labels: Vec<usize>) -> Result<Self, DatasetError> {
        let features = features_from_rows(rows)?;
        if labels.len() != features.nrows() {
            return Err(DatasetError::LabelCount {
                samples: features.nrows(),
                labels: labels.len(),
            });
        }
        if let Some((row, &label)) = labels
            .iter()
            .enumerate()
            .find(|(_, label)| **label >= MAX_CLASSES)
        {
            return Err(DatasetError::LabelTooLarge {
                row,
                label,
                max: MAX_CLASSES - 1,
            });
        }
        Ok(Self { features, labels })
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Three small 2-D clusters around (-1,-1), (0,1) and (2,2), three samples each.
    pub fn three_clusters() -> Self {
        Self {
            features: array![
                [-1.0, -1.2],
                [-0.8, -0.9],
                [-1.2, -1.1],
                [0.0, 1.0],
                [0.2, 0.8],
                [-0.1, 1.1],
                [2.0, 2.1],
                [1.8, 1.9],
                [2.2, 2.0]
            ],
            labels: vec![0, 0, 0, 1, 1, 1, 2, 2, 2],
        }
    }
}

/// JSON dataset layout: `{ "x": [[...], ...], "y": [...] }`.
///
/// `y` may be omitted for prediction inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetFile {
    pub x: Vec<Vec<f64>>,
    #[serde(default)]
    pub y: Vec<usize>,
}

impl DatasetFile {
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let bytes = std::fs::read(path).map_err(|source| DatasetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate as a labeled training set.
    pub fn into_dataset(self) -> Result<Dataset, DatasetError> {
        Dataset::new(&self.x, self.y)
    }

    /// Validate the feature table only.
    pub fn features(&self) -> Result<Array2<f64>, DatasetError> {
        features_from_rows(&self.x)
    }
}
