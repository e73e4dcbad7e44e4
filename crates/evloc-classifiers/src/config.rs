use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TrainError};

/// Hyper-parameters of the in-crate boosted-tree backend.
///
/// Field names follow the xgboost parameter names, so existing xgboost
/// parameter sets deserialize unchanged.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub objective: Objective,
    pub eta: f64,
    pub max_depth: u32,
    pub min_child_weight: f64,
    pub lambda: f64,
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub colsample_bylevel: f64,
    pub base_score: f64,
    pub eval_metric: EvalMetric,
    pub importance_type: ImportanceType,
    /// Threads used for split search, 0 lets rayon decide.
    pub nthread: usize,
    pub seed: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Probabilities in [0, 1].
    #[serde(rename = "binary:logistic")]
    BinaryLogistic,
    /// Raw margins before the logistic transform.
    #[serde(rename = "binary:logitraw")]
    BinaryLogitRaw,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvalMetric {
    LogLoss,
    Error,
    Auc,
}

impl EvalMetric {
    pub fn name(&self) -> &'static str {
        match self {
            EvalMetric::LogLoss => "logloss",
            EvalMetric::Error => "error",
            EvalMetric::Auc => "auc",
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceType {
    /// Number of splits using the feature.
    Weight,
    /// Average split gain.
    Gain,
    TotalGain,
    /// Average hessian mass routed through the feature's splits.
    Cover,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            objective: Objective::BinaryLogistic,
            eta: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            lambda: 1.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            colsample_bylevel: 1.0,
            base_score: 0.5,
            eval_metric: EvalMetric::LogLoss,
            importance_type: ImportanceType::Weight,
            nthread: 0,
            seed: 0,
        }
    }
}

impl ModelConfig {
    /// Reject hyper-parameters the booster cannot train with.
    pub fn validate(&self) -> Result<()> {
        let fraction = |name: &str, v: f64| {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(TrainError::InvalidConfig(format!(
                    "{} must be in (0, 1], got {}",
                    name, v
                )))
            }
        };

        if !(self.eta > 0.0 && self.eta.is_finite()) {
            return Err(TrainError::InvalidConfig(format!(
                "eta must be positive, got {}",
                self.eta
            )));
        }
        if self.max_depth == 0 {
            return Err(TrainError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.min_child_weight < 0.0 || self.lambda < 0.0 || self.gamma < 0.0 {
            return Err(TrainError::InvalidConfig(
                "min_child_weight, lambda and gamma must be non-negative".to_string(),
            ));
        }
        fraction("subsample", self.subsample)?;
        fraction("colsample_bytree", self.colsample_bytree)?;
        fraction("colsample_bylevel", self.colsample_bylevel)?;
        if !(self.base_score > 0.0 && self.base_score < 1.0) {
            return Err(TrainError::InvalidConfig(format!(
                "base_score must be in (0, 1), got {}",
                self.base_score
            )));
        }
        Ok(())
    }
}

/// Boosting round limits shared by every backend.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RoundLimits {
    /// Stop a fold once the validation metric has not improved for this many
    /// rounds. 0 disables early stopping.
    pub early_stopping_rounds: usize,
    pub max_rounds: usize,
    /// Log the watchlist every N rounds, 0 silences it.
    pub log_every: usize,
}

impl Default for RoundLimits {
    fn default() -> Self {
        Self {
            early_stopping_rounds: 50,
            max_rounds: 100_000,
            log_every: 1,
        }
    }
}

/// Training configuration: the round limits the cross-validation loop
/// understands, plus backend hyper-parameters passed through untouched.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct TrainConfig<P = ModelConfig> {
    #[serde(flatten)]
    pub rounds: RoundLimits,
    #[serde(flatten)]
    pub params: P,
}

impl<P> TrainConfig<P> {
    pub fn new(rounds: RoundLimits, params: P) -> Self {
        Self { rounds, params }
    }
}

/// When feature importances are logged during a cross-validation run.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImportanceMode {
    Every,
    #[default]
    Final,
    None,
}

impl FromStr for ImportanceMode {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "every" => Ok(ImportanceMode::Every),
            "final" => Ok(ImportanceMode::Final),
            "none" => Ok(ImportanceMode::None),
            _ => Err(TrainError::InvalidConfig(format!(
                "importance mode must be one of 'every', 'final' or 'none', got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for ImportanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportanceMode::Every => "every",
            ImportanceMode::Final => "final",
            ImportanceMode::None => "none",
        };
        f.write_str(name)
    }
}
