use thiserror::Error;

use crate::math::ShapeError;

/// Failures raised while preparing or running a cross-validated training run.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("shape mismatch: {what} (expected {expected}, got {actual})")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("could not coerce test columns to match training columns: {0}. Set skip_checks to run anyway")]
    ColumnReorderError(String),

    #[error("fold source yielded no folds")]
    SplitExhaustion,

    #[error("fold {fold} is invalid: {reason}")]
    InvalidFold { fold: usize, reason: String },

    #[error("fold {fold} overwrites the out-of-fold prediction at index {index}")]
    OverlappingValidation { fold: usize, index: usize },

    #[error("label at row {index} is {value}, expected 0 or 1")]
    InvalidLabel { index: usize, value: f64 },

    #[error("model backend failed: {0}")]
    Backend(String),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

pub type Result<T> = std::result::Result<T, TrainError>;
