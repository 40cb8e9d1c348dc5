//! Error taxonomies for dataset parsing, model I/O and training.

use thiserror::Error;

/// Errors raised while reading or writing datasets in the SVM-light-like
/// text format.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading or writing predictor model files.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid model type: '{0}'")]
    InvalidModelType(String),
    #[error("model line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("branch refers to undefined tree id {0}")]
    UnresolvedReference(u64),
    #[error("empty model input")]
    EmptyInput,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the tree learner.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("optimizer produced non-finite values")]
    NumericFailure,
    #[error("task runner refused a submission")]
    Cancelled,
}
