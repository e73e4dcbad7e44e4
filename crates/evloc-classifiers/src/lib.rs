//! evloc-classifiers: k-fold cross-validated boosted-tree classifiers.
//!
//! This crate trains one gradient-boosted binary classifier per fold, keeps
//! each fold's best early-stopped round, and aggregates out-of-fold
//! predictions, averaged test predictions, summed feature importances and
//! validation scores. The boosting primitive sits behind the
//! [`models::ModelBackend`] trait; [`models::TreeBooster`] is the built-in
//! second-order tree booster.
pub mod config;
pub mod cross_validation;
pub mod dataset;
pub mod error;
pub mod folds;
pub mod io;
pub mod math;
pub mod metrics;
pub mod models;
pub mod report;
pub mod timer;

pub use config::{ImportanceMode, ModelConfig, RoundLimits, TrainConfig};
pub use cross_validation::{train_kfold, FoldResult, KFoldOptions, KFoldResult, OofPolicy};
pub use dataset::{Dataset, Features};
pub use error::{Result, TrainError};
pub use folds::{Fold, FoldSource, GroupShuffleSplit, KFold, StratifiedKFold};
