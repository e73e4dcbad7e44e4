use std::collections::BTreeMap;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::config::{EvalMetric, ImportanceType, ModelConfig, Objective, RoundLimits};
use crate::error::{Result, TrainError};
use crate::math::Array2;
use crate::metrics;
use crate::models::backend::{Importances, ModelBackend, TrainedModel, TrainingData};
use crate::models::tree::{GradPair, RegressionTree, TreeNode, TreeParams};

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Gradient-boosted trees for the binary logistic objective.
///
/// Keeps every trained round; `best_iteration` marks the round with the best
/// validation score and is what predictions and importances use by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booster {
    trees: Vec<RegressionTree>,
    base_margin: f64,
    objective: Objective,
    eval_metric: EvalMetric,
    importance_type: ImportanceType,
    num_features: usize,
    best_iteration: usize,
    best_score: f64,
}

impl Booster {
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn eval_metric(&self) -> EvalMetric {
        self.eval_metric
    }

    fn margins(&self, x: &Array2<f32>, n_trees: usize) -> Vec<f64> {
        x.rows()
            .map(|row| {
                self.trees[..n_trees]
                    .iter()
                    .fold(self.base_margin, |acc, tree| acc + tree.predict_row(row))
            })
            .collect()
    }

    /// Per-feature split statistics over the first `n_trees` trees.
    fn split_stats(&self, n_trees: usize) -> BTreeMap<usize, (usize, f64, f64)> {
        let mut stats: BTreeMap<usize, (usize, f64, f64)> = BTreeMap::new();
        for tree in &self.trees[..n_trees] {
            for node in tree.nodes() {
                if let TreeNode::Split {
                    feature,
                    gain,
                    cover,
                    ..
                } = node
                {
                    let entry = stats.entry(*feature).or_insert((0, 0.0, 0.0));
                    entry.0 += 1;
                    entry.1 += gain;
                    entry.2 += cover;
                }
            }
        }
        stats
    }
}

impl TrainedModel for Booster {
    fn best_score(&self) -> f64 {
        self.best_score
    }

    fn best_iteration(&self) -> usize {
        self.best_iteration
    }

    fn num_rounds(&self) -> usize {
        self.trees.len()
    }

    fn predict(&self, x: &Array2<f32>, at_best_round: bool) -> Vec<f32> {
        let n_trees = if at_best_round {
            (self.best_iteration + 1).min(self.trees.len())
        } else {
            self.trees.len()
        };
        let margins = self.margins(x, n_trees);
        match self.objective {
            Objective::BinaryLogistic => margins.into_iter().map(|m| sigmoid(m) as f32).collect(),
            Objective::BinaryLogitRaw => margins.into_iter().map(|m| m as f32).collect(),
        }
    }

    fn importances(&self, feature_names: &[String]) -> Importances {
        let n_trees = (self.best_iteration + 1).min(self.trees.len());
        self.split_stats(n_trees)
            .into_iter()
            .map(|(feature, (count, gain, cover))| {
                let name = feature_names
                    .get(feature)
                    .cloned()
                    .unwrap_or_else(|| format!("f{}", feature));
                let score = match self.importance_type {
                    ImportanceType::Weight => count as f64,
                    ImportanceType::Gain => gain / count as f64,
                    ImportanceType::TotalGain => gain,
                    ImportanceType::Cover => cover / count as f64,
                };
                (name, score)
            })
            .collect()
    }

    fn name(&self) -> &str {
        "gbtree"
    }
}

/// Trains [`Booster`]s from a [`ModelConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeBooster;

impl TreeBooster {
    pub fn new() -> Self {
        TreeBooster
    }
}

fn sample_columns(rng: &mut StdRng, columns: &[usize], fraction: f64) -> Vec<usize> {
    if fraction >= 1.0 {
        return columns.to_vec();
    }
    let amount = ((columns.len() as f64 * fraction).round() as usize).clamp(1, columns.len());
    let mut picked: Vec<usize> = sample(rng, columns.len(), amount)
        .into_iter()
        .map(|i| columns[i])
        .collect();
    picked.sort_unstable();
    picked
}

impl ModelBackend for TreeBooster {
    type Params = ModelConfig;
    type Model = Booster;

    fn validate(&self, params: &ModelConfig) -> Result<()> {
        params.validate()
    }

    fn train(
        &self,
        params: &ModelConfig,
        train: &TrainingData<'_>,
        valid: &TrainingData<'_>,
        limits: &RoundLimits,
    ) -> Result<Booster> {
        params.validate()?;
        if limits.max_rounds == 0 {
            return Err(TrainError::InvalidConfig(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        let num_features = train.x.ncols();
        if num_features == 0 {
            return Err(TrainError::InvalidConfig(
                "training data has no feature columns".to_string(),
            ));
        }
        if valid.x.ncols() != num_features {
            return Err(TrainError::ShapeMismatch {
                what: "validation vs training feature count",
                expected: num_features,
                actual: valid.x.ncols(),
            });
        }
        if train.nrows() == 0 || valid.nrows() == 0 {
            return Err(TrainError::Backend(
                "training and validation sets must be non-empty".to_string(),
            ));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(params.nthread)
            .build()
            .map_err(|e| TrainError::Backend(format!("failed to build thread pool: {}", e)))?;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_child_weight: params.min_child_weight,
            lambda: params.lambda,
            gamma: params.gamma,
            eta: params.eta,
        };
        let base_margin = (params.base_score / (1.0 - params.base_score)).ln();
        let all_columns: Vec<usize> = (0..num_features).collect();
        let all_rows: Vec<usize> = (0..train.nrows()).collect();

        let mut train_margin = vec![base_margin; train.nrows()];
        let mut valid_margin = vec![base_margin; valid.nrows()];
        let mut trees = Vec::new();
        let mut best_iteration = 0;
        let mut best_score = f64::INFINITY;
        let metric = params.eval_metric;
        let shown = |score: f64| if metric == EvalMetric::Auc { -score } else { score };

        debug!(
            "Boosting up to {} rounds on {} train / {} valid rows, {} features",
            limits.max_rounds,
            train.nrows(),
            valid.nrows(),
            num_features
        );

        for round in 0..limits.max_rounds {
            let grads: Vec<GradPair> = train_margin
                .iter()
                .zip(train.y)
                .map(|(&m, &y)| {
                    let p = sigmoid(m);
                    GradPair {
                        grad: p - y as f64,
                        hess: (p * (1.0 - p)).max(1e-16),
                    }
                })
                .collect();

            let rows: Vec<usize> = if params.subsample < 1.0 {
                let picked: Vec<usize> = all_rows
                    .iter()
                    .copied()
                    .filter(|_| rng.gen::<f64>() < params.subsample)
                    .collect();
                if picked.is_empty() {
                    all_rows.clone()
                } else {
                    picked
                }
            } else {
                all_rows.clone()
            };

            let tree_columns = sample_columns(&mut rng, &all_columns, params.colsample_bytree);
            let level_features: Vec<Vec<usize>> = (0..params.max_depth)
                .map(|_| sample_columns(&mut rng, &tree_columns, params.colsample_bylevel))
                .collect();

            let tree = RegressionTree::fit(train.x, &grads, &rows, &level_features, &tree_params, &pool);

            for (m, row) in train_margin.iter_mut().zip(train.x.rows()) {
                *m += tree.predict_row(row);
            }
            for (m, row) in valid_margin.iter_mut().zip(valid.x.rows()) {
                *m += tree.predict_row(row);
            }
            trees.push(tree);

            let train_probs: Vec<f64> = train_margin.iter().map(|&m| sigmoid(m)).collect();
            let valid_probs: Vec<f64> = valid_margin.iter().map(|&m| sigmoid(m)).collect();
            let train_score = metrics::evaluate(metric, train.y, &train_probs);
            let valid_score = metrics::evaluate(metric, valid.y, &valid_probs);

            if limits.log_every > 0 && round % limits.log_every == 0 {
                info!(
                    "[{}]\ttrain-{}:{:.5}\tvalid-{}:{:.5}",
                    round,
                    metric.name(),
                    shown(train_score),
                    metric.name(),
                    shown(valid_score)
                );
            }

            if valid_score < best_score {
                best_score = valid_score;
                best_iteration = round;
            } else if limits.early_stopping_rounds > 0
                && round - best_iteration >= limits.early_stopping_rounds
            {
                info!(
                    "Stopping. Best iteration: [{}]\tvalid-{}:{:.5}",
                    best_iteration,
                    metric.name(),
                    shown(best_score)
                );
                break;
            }
        }

        Ok(Booster {
            trees,
            base_margin,
            objective: params.objective,
            eval_metric: metric,
            importance_type: params.importance_type,
            num_features,
            best_iteration,
            best_score,
        })
    }
}
