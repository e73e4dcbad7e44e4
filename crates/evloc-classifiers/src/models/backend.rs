use std::collections::BTreeMap;

use crate::config::RoundLimits;
use crate::error::{Result, TrainError};
use crate::math::Array2;

/// Feature name to importance score. Features a model never used are absent.
pub type Importances = BTreeMap<String, f64>;

/// A feature matrix with its 0/1 labels, borrowed for one training call.
#[derive(Debug, Clone, Copy)]
pub struct TrainingData<'a> {
    pub x: &'a Array2<f32>,
    pub y: &'a [f32],
}

impl<'a> TrainingData<'a> {
    pub fn new(x: &'a Array2<f32>, y: &'a [f32]) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(TrainError::ShapeMismatch {
                what: "labels vs feature rows",
                expected: x.nrows(),
                actual: y.len(),
            });
        }
        Ok(TrainingData { x, y })
    }

    pub fn nrows(&self) -> usize {
        self.x.nrows()
    }
}

/// A fitted model that remembers the boosting round with the best
/// validation score.
pub trait TrainedModel {
    /// Validation score of the best round. Lower is better.
    fn best_score(&self) -> f64;

    /// Zero-based index of the best round.
    fn best_iteration(&self) -> usize;

    /// Number of rounds actually trained.
    fn num_rounds(&self) -> usize;

    /// Predict, truncated to the best round when `at_best_round` is set.
    fn predict(&self, x: &Array2<f32>, at_best_round: bool) -> Vec<f32>;

    /// Importances of the best-round model keyed by `feature_names`.
    fn importances(&self, feature_names: &[String]) -> Importances;

    fn name(&self) -> &str {
        "model"
    }
}

/// The boosting primitive the cross-validation loop drives.
///
/// `Params` are opaque to the loop: they are deserialized alongside the round
/// limits and handed back to the backend for every fold.
pub trait ModelBackend {
    type Params;
    type Model: TrainedModel;

    /// Reject unusable parameters before any fold starts.
    fn validate(&self, params: &Self::Params) -> Result<()>;

    /// Train a fresh model on `train`, monitoring `valid` for early stopping.
    fn train(
        &self,
        params: &Self::Params,
        train: &TrainingData<'_>,
        valid: &TrainingData<'_>,
        limits: &RoundLimits,
    ) -> Result<Self::Model>;
}
