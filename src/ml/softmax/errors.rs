use std::path::PathBuf;

use thiserror::Error;

/// Caller mistakes detected by the classifier before it touches its parameters.
///
/// The panicking API (`fit`, `predict_proba`, `predict`, `accuracy`) aborts with
/// one of these; the `try_*` variants hand it back instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    /// The feature matrix has no rows.
    #[error("feature matrix has no samples")]
    EmptyInput,
    /// Two sequences that must align 1:1 have different lengths.
    #[error("{what} length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        /// Which sequence was checked.
        what: &'static str,
        /// Length implied by the features.
        expected: usize,
        /// Length actually supplied.
        got: usize,
    },
    /// Feature count differs from the shape the parameters were built for.
    #[error("feature count mismatch: model expects {expected}, got {got}")]
    FeatureMismatch {
        /// Feature count of the existing parameters.
        expected: usize,
        /// Feature count of the supplied matrix.
        got: usize,
    },
    /// A label does not fit the class count fixed by the first training call.
    #[error("label {label} out of range for a model with {n_classes} classes")]
    LabelOutOfRange {
        /// Offending label.
        label: usize,
        /// Class count of the existing parameters.
        n_classes: usize,
    },
    /// A label so large that `label + 1` classes cannot be represented.
    #[error("label {label} is too large to size a class dimension")]
    LabelTooLarge {
        /// Offending label.
        label: usize,
    },
    /// Inference or evaluation before any training or load.
    #[error("model not trained")]
    NotTrained,
    /// A hyperparameter is outside its valid range.
    #[error("invalid hyperparameter {name}: {value}")]
    InvalidHyperparameter {
        /// Hyperparameter name.
        name: &'static str,
        /// Rejected value, formatted.
        value: String,
    },
}

/// Recoverable failures while saving or loading a model file.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Saving was requested before the model had parameters.
    #[error("cannot save an untrained model")]
    NotTrained,
    /// Failed to read the model file.
    #[error("Failed to read model file {path}: {source}")]
    Read {
        /// Model file path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to write the model file or its temporary sibling.
    #[error("Failed to write model file {path}: {source}")]
    Write {
        /// Path that failed to write.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The file is not a valid JSON model record.
    #[error("Invalid model file {path}: {source}")]
    Parse {
        /// Model file path.
        path: PathBuf,
        /// JSON parse error.
        source: serde_json::Error,
    },
    /// Failed to encode the model record.
    #[error("Failed to serialize model: {0}")]
    Serialize(serde_json::Error),
    /// The record was written by an unknown format revision.
    #[error("Unsupported model format_version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },
    /// The record parsed but its contents are inconsistent.
    #[error("Inconsistent model record: {0}")]
    Invalid(String),
}

impl PersistError {
    /// True when the failure is a missing model file.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PersistError::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
