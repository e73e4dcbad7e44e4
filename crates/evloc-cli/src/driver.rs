//! Per-class training run: load `cls_<class>.csv`, train the k-fold
//! ensemble, then record the mean score and persist the models.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use evloc_classifiers::config::{EvalMetric, ImportanceMode, ModelConfig, Objective, RoundLimits};
use evloc_classifiers::io::{dataset_path, read_dataset_csv, ModelStore, ScoreLog};
use evloc_classifiers::models::TreeBooster;
use evloc_classifiers::{train_kfold, FoldSource, GroupShuffleSplit, KFoldOptions, TrainConfig};

/// Group-aware split settings used when the dataset carries groups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroupSplitConfig {
    pub n_splits: usize,
    pub test_size: f64,
    pub seed: u64,
}

impl Default for GroupSplitConfig {
    fn default() -> Self {
        Self {
            n_splits: 5,
            test_size: 0.3,
            seed: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriverConfig {
    pub data_dir: PathBuf,
    pub model_dir: PathBuf,
    pub score_log: PathBuf,
    pub model_prefix: String,
    pub group_split: GroupSplitConfig,
    /// Fold count used when the dataset has no group column.
    pub fallback_folds: usize,
    pub kfold: KFoldOptions,
    pub train: TrainConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./xgb-training"),
            model_dir: PathBuf::from("./xgb-models"),
            score_log: PathBuf::from("xgb4_scores.csv"),
            model_prefix: "xgb4".to_string(),
            group_split: GroupSplitConfig::default(),
            fallback_folds: 5,
            kfold: KFoldOptions {
                importance_mode: ImportanceMode::Final,
                ..KFoldOptions::default()
            },
            train: TrainConfig::new(
                RoundLimits {
                    log_every: 50,
                    ..RoundLimits::default()
                },
                ModelConfig {
                    objective: Objective::BinaryLogistic,
                    eta: 0.02,
                    max_depth: 4,
                    colsample_bylevel: 0.8,
                    subsample: 0.9,
                    eval_metric: EvalMetric::LogLoss,
                    nthread: 2,
                    ..ModelConfig::default()
                },
            ),
        }
    }
}

/// Load a driver configuration from a JSON file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DriverConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: DriverConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub class_id: u32,
    pub scores: Vec<f64>,
    pub mean_score: f64,
    pub model_path: PathBuf,
}

/// Train and persist the ensemble for one class.
pub fn run(class_id: u32, config: &DriverConfig) -> Result<RunSummary> {
    let path = dataset_path(&config.data_dir, class_id);
    let dataset = read_dataset_csv(&path)
        .with_context(|| format!("Failed to load dataset for class {}", class_id))?;
    dataset.log_summary();

    let folds = match dataset.groups.as_deref() {
        Some(groups) => {
            let split = &config.group_split;
            let splits = GroupShuffleSplit::new(split.n_splits, split.test_size, split.seed)
                .split(groups)?;
            FoldSource::Splits(Box::new(splits))
        }
        None => {
            log::warn!(
                "{} has no group column, falling back to {}-fold splitting",
                path.display(),
                config.fallback_folds
            );
            FoldSource::Count(config.fallback_folds)
        }
    };

    let result = train_kfold(&TreeBooster, &config.train, &dataset, None, folds, &config.kfold)
        .with_context(|| format!("Cross-validation failed for class {}", class_id))?;

    let scores = result.scores.clone();
    let mean_score = result.mean_score();

    ScoreLog::new(&config.score_log).append(class_id, mean_score)?;
    let model_path = ModelStore::new(&config.model_dir, config.model_prefix.as_str()).save(
        class_id,
        mean_score,
        &result.into_models(),
    )?;

    Ok(RunSummary {
        class_id,
        scores,
        mean_score,
        model_path,
    })
}
