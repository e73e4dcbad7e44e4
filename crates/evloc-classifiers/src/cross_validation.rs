//! K-fold training of boosted models with out-of-fold predictions.
//!
//! [`train_kfold`] trains one fresh model per fold, each stopped early against
//! its own validation set, and aggregates:
//!
//! * out-of-fold predictions scattered back to the original sample positions,
//! * the mean of every fold's predictions on an optional held-out test set,
//! * feature importances summed across folds,
//! * each fold's best validation score.
//!
//! Configuration and shape problems are reported before the first fold
//! trains. A failure inside any fold aborts the whole run.
use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::config::{ImportanceMode, TrainConfig};
use crate::dataset::{Dataset, Features};
use crate::error::{Result, TrainError};
use crate::folds::{self, FoldSource};
use crate::math::Array1;
use crate::models::{Importances, ModelBackend, TrainedModel, TrainingData};
use crate::report::format_importances;
use crate::timer::Timer;

/// What happens when two folds validate the same sample.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OofPolicy {
    /// The later fold's prediction replaces the earlier one.
    #[default]
    LastWriteWins,
    /// Overlapping validation sets are rejected with
    /// [`TrainError::OverlappingValidation`].
    Disjoint,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct KFoldOptions {
    /// Class labels used for stratified splitting when folds are generated.
    /// Per-sample data, so it is never read from or written to config files.
    #[serde(skip)]
    pub stratify: Option<Vec<i64>>,
    pub seed: u64,
    /// Skip the test-set width check and name-based column reordering.
    pub skip_checks: bool,
    pub importance_mode: ImportanceMode,
    pub oof_policy: OofPolicy,
}

impl Default for KFoldOptions {
    fn default() -> Self {
        Self {
            stratify: None,
            seed: 1337,
            skip_checks: false,
            importance_mode: ImportanceMode::Final,
            oof_policy: OofPolicy::LastWriteWins,
        }
    }
}

/// Everything produced by a single fold.
#[derive(Debug, Clone)]
pub struct FoldResult<M> {
    pub model: M,
    pub score: f64,
    pub best_iteration: usize,
    pub valid_indices: Vec<usize>,
    pub valid_predictions: Vec<f32>,
    pub test_predictions: Option<Vec<f32>>,
    pub importances: Importances,
}

#[derive(Debug, Clone)]
pub struct KFoldResult<M> {
    pub folds: Vec<FoldResult<M>>,
    /// Out-of-fold predictions, one per training sample. Samples no fold
    /// validated stay at 0.0.
    pub oof: Vec<f32>,
    /// How many folds wrote each out-of-fold position.
    pub coverage: Vec<u32>,
    /// Mean test prediction across folds, `None` when no test set was given.
    pub test_predictions: Option<Vec<f32>>,
    pub importances: Importances,
    pub scores: Vec<f64>,
}

impl<M> KFoldResult<M> {
    pub fn models(&self) -> impl Iterator<Item = &M> {
        self.folds.iter().map(|f| &f.model)
    }

    pub fn into_models(self) -> Vec<M> {
        self.folds.into_iter().map(|f| f.model).collect()
    }

    pub fn mean_score(&self) -> f64 {
        mean(&self.scores)
    }

    /// Positions no fold validated.
    pub fn uncovered(&self) -> Vec<usize> {
        self.coverage
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == 0)
            .map(|(i, _)| i)
            .collect()
    }
}

fn mean(values: &[f64]) -> f64 {
    Array1::from_vec(values.to_vec()).mean().unwrap_or(f64::NAN)
}

/// Bring the test features into the training column layout.
fn prepare_test<'a>(train: &Features, test: &'a Features) -> Result<Cow<'a, Features>> {
    if test.ncols() != train.ncols() {
        return Err(TrainError::ShapeMismatch {
            what: "test vs training feature count",
            expected: train.ncols(),
            actual: test.ncols(),
        });
    }
    match train.names() {
        Some(names) => Ok(Cow::Owned(test.align_to(names)?)),
        None => Ok(Cow::Borrowed(test)),
    }
}

/// Train one model per fold and aggregate their predictions.
///
/// # Arguments
///
/// * `backend` - The boosting primitive used to train every fold
/// * `config` - Round limits plus the backend's hyper-parameters
/// * `train` - Training samples; labels must be 0/1
/// * `test` - Optional held-out features predicted by every fold
/// * `folds` - A fold count to generate, or pre-built splits used verbatim
/// * `options` - Seed, stratification, check and reporting switches
///
/// # Returns
///
/// The fold results with their out-of-fold, test, importance and score
/// aggregates.
pub fn train_kfold<B: ModelBackend>(
    backend: &B,
    config: &TrainConfig<B::Params>,
    train: &Dataset,
    test: Option<&Features>,
    folds: FoldSource,
    options: &KFoldOptions,
) -> Result<KFoldResult<B::Model>> {
    backend.validate(&config.params)?;

    let test = match test {
        Some(t) if !options.skip_checks => Some(prepare_test(&train.features, t)?),
        Some(t) => Some(Cow::Borrowed(t)),
        None => None,
    };

    let n = train.len();
    let fold_iter = folds::split(n, options.stratify.as_deref(), folds, options.seed)?;
    let feature_names = train.features.reporting_names();

    let mut timer = Timer::new();
    let mut results: Vec<FoldResult<B::Model>> = Vec::new();
    let mut scores = Vec::new();
    let mut importances = Importances::new();
    let mut oof = vec![0.0f32; n];
    let mut coverage = vec![0u32; n];

    for (i, fold) in fold_iter.enumerate() {
        fold.validate(i, n)?;
        if options.oof_policy == OofPolicy::Disjoint {
            if let Some(&index) = fold.valid.iter().find(|&&idx| coverage[idx] > 0) {
                return Err(TrainError::OverlappingValidation { fold: i, index });
            }
        }

        timer.add(format!("fold{}", i));
        log::info!(
            "Training fold {} with {} training and {} validation samples",
            i,
            fold.train.len(),
            fold.valid.len()
        );

        // fold subsets only live for this block
        let (model, valid_predictions) = {
            let (x_train, y_train) = train.subset(&fold.train);
            let (x_valid, y_valid) = train.subset(&fold.valid);
            let train_data = TrainingData::new(&x_train, &y_train)?;
            let valid_data = TrainingData::new(&x_valid, &y_valid)?;

            let model = backend.train(&config.params, &train_data, &valid_data, &config.rounds)?;
            let predictions = model.predict(&x_valid, true);
            (model, predictions)
        };
        if valid_predictions.len() != fold.valid.len() {
            return Err(TrainError::Backend(format!(
                "fold {} produced {} validation predictions for {} samples",
                i,
                valid_predictions.len(),
                fold.valid.len()
            )));
        }

        let score = model.best_score();
        let best_iteration = model.best_iteration();
        scores.push(score);
        log::info!(
            "Finished training fold {} - took {} - best iteration {} - running score {:.5}",
            i,
            timer.fsince(&format!("fold{}", i)),
            best_iteration,
            mean(&scores)
        );

        let fold_importances = model.importances(&feature_names);
        if options.importance_mode == ImportanceMode::Every {
            log::info!("Fold {} importances: {}", i, format_importances(&fold_importances));
        }
        for (name, value) in &fold_importances {
            *importances.entry(name.clone()).or_insert(0.0) += value;
        }

        for (&idx, &p) in fold.valid.iter().zip(&valid_predictions) {
            oof[idx] = p;
            coverage[idx] += 1;
        }

        let test_predictions = test.as_ref().map(|t| model.predict(t.matrix(), true));

        results.push(FoldResult {
            model,
            score,
            best_iteration,
            valid_indices: fold.valid,
            valid_predictions,
            test_predictions,
            importances: fold_importances,
        });
    }

    if results.is_empty() {
        return Err(TrainError::SplitExhaustion);
    }

    let test_predictions = test.as_ref().map(|t| {
        let mut sum = vec![0.0f64; t.nrows()];
        for fold_preds in results.iter().filter_map(|r| r.test_predictions.as_ref()) {
            for (s, &p) in sum.iter_mut().zip(fold_preds) {
                *s += p as f64;
            }
        }
        let k = results.len() as f64;
        sum.into_iter().map(|s| (s / k) as f32).collect::<Vec<f32>>()
    });

    log::info!(
        "Finished training {} models, took {}",
        results.len(),
        timer.fsince("start")
    );
    let uncovered = coverage.iter().filter(|&&c| c == 0).count();
    if uncovered > 0 {
        log::debug!("{} of {} samples were never validated", uncovered, n);
    }
    if matches!(options.importance_mode, ImportanceMode::Every | ImportanceMode::Final) {
        log::info!("Overall feature importances: {}", format_importances(&importances));
    }

    Ok(KFoldResult {
        folds: results,
        oof,
        coverage,
        test_predictions,
        importances,
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::config::RoundLimits;
    use crate::folds::Fold;
    use crate::math::Array2;

    /// Predicts a constant per fold and reports fold-dependent importances.
    #[derive(Debug)]
    struct ConstModel {
        fold: usize,
    }

    impl TrainedModel for ConstModel {
        fn best_score(&self) -> f64 {
            self.fold as f64
        }

        fn best_iteration(&self) -> usize {
            self.fold * 10
        }

        fn num_rounds(&self) -> usize {
            self.fold * 10 + 1
        }

        fn predict(&self, x: &Array2<f32>, _at_best_round: bool) -> Vec<f32> {
            vec![self.fold as f32 + 1.0; x.nrows()]
        }

        fn importances(&self, feature_names: &[String]) -> Importances {
            // fold k uses features 0..=k
            feature_names
                .iter()
                .take(self.fold + 1)
                .map(|n| (n.clone(), 1.0 + self.fold as f64))
                .collect()
        }
    }

    #[derive(Default)]
    struct ConstBackend {
        calls: Cell<usize>,
        fail_at: Option<usize>,
    }

    impl ModelBackend for ConstBackend {
        type Params = bool;
        type Model = ConstModel;

        fn validate(&self, params: &bool) -> Result<()> {
            if *params {
                Ok(())
            } else {
                Err(TrainError::InvalidConfig("rejected".to_string()))
            }
        }

        fn train(
            &self,
            _params: &bool,
            _train: &TrainingData<'_>,
            _valid: &TrainingData<'_>,
            _limits: &RoundLimits,
        ) -> Result<ConstModel> {
            let fold = self.calls.get();
            self.calls.set(fold + 1);
            if self.fail_at == Some(fold) {
                return Err(TrainError::Backend("boom".to_string()));
            }
            Ok(ConstModel { fold })
        }
    }

    fn config() -> TrainConfig<bool> {
        TrainConfig::new(RoundLimits::default(), true)
    }

    fn dataset(n: usize, names: &[&str]) -> Dataset {
        let f = names.len();
        let x = Array2::from_shape_vec((n, f), (0..n * f).map(|v| v as f32).collect()).unwrap();
        let features =
            Features::with_names(x, names.iter().map(|s| s.to_string()).collect()).unwrap();
        Dataset::new(features, (0..n).map(|i| (i % 2) as f32).collect()).unwrap()
    }

    #[test]
    fn prebuilt_splits_give_one_result_each() {
        let data = dataset(6, &["a", "b"]);
        let custom = vec![
            Fold::new(vec![2, 3, 4, 5], vec![0, 1]),
            Fold::new(vec![0, 1, 4, 5], vec![2, 3]),
            Fold::new(vec![0, 1, 2, 3], vec![4, 5]),
        ];
        let backend = ConstBackend::default();
        let result = train_kfold(
            &backend,
            &config(),
            &data,
            None,
            FoldSource::splits(custom),
            &KFoldOptions::default(),
        )
        .unwrap();

        assert_eq!(result.folds.len(), 3);
        assert_eq!(backend.calls.get(), 3);
        assert_eq!(result.folds[1].valid_indices, vec![2, 3]);
        assert_eq!(result.oof, vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        assert_eq!(result.coverage, vec![1; 6]);
        assert_eq!(result.scores, vec![0.0, 1.0, 2.0]);
        assert_eq!(result.mean_score(), 1.0);
        assert_eq!(result.folds[2].best_iteration, 20);
        assert!(result.test_predictions.is_none());
    }

    #[test]
    fn importances_sum_across_folds() {
        let data = dataset(9, &["a", "b", "c"]);
        let result = train_kfold(
            &ConstBackend::default(),
            &config(),
            &data,
            None,
            FoldSource::Count(3),
            &KFoldOptions::default(),
        )
        .unwrap();

        // fold 0: a=1; fold 1: a=2, b=2; fold 2: a=3, b=3, c=3
        assert_eq!(result.importances["a"], 6.0);
        assert_eq!(result.importances["b"], 5.0);
        assert_eq!(result.importances["c"], 3.0);
        for name in ["a", "b", "c"] {
            let per_fold: f64 = result
                .folds
                .iter()
                .map(|f| f.importances.get(name).copied().unwrap_or(0.0))
                .sum();
            assert_eq!(result.importances[name], per_fold);
        }
        assert!(!result.folds[0].importances.contains_key("c"));
    }

    #[test]
    fn generated_folds_cover_every_sample_once() {
        let data = dataset(20, &["a"]);
        let options = KFoldOptions {
            stratify: Some(data.classes()),
            ..KFoldOptions::default()
        };
        let result = train_kfold(
            &ConstBackend::default(),
            &config(),
            &data,
            None,
            FoldSource::Count(4),
            &options,
        )
        .unwrap();
        assert_eq!(result.oof.len(), 20);
        assert!(result.coverage.iter().all(|&c| c == 1));
        assert!(result.uncovered().is_empty());
    }

    #[test]
    fn test_predictions_are_fold_means() {
        let data = dataset(8, &["a", "b"]);
        let test = Features::with_names(
            Array2::from_shape_vec((3, 2), vec![0.0; 6]).unwrap(),
            vec!["b".to_string(), "a".to_string()],
        )
        .unwrap();
        let result = train_kfold(
            &ConstBackend::default(),
            &config(),
            &data,
            Some(&test),
            FoldSource::Count(4),
            &KFoldOptions::default(),
        )
        .unwrap();

        // folds predict 1, 2, 3, 4
        assert_eq!(result.test_predictions, Some(vec![2.5; 3]));
        assert!(result.folds.iter().all(|f| f.test_predictions.as_ref().map(Vec::len) == Some(3)));
    }

    #[test]
    fn overlapping_validation_last_write_wins() {
        let data = dataset(4, &["a"]);
        let custom = vec![
            Fold::new(vec![2, 3], vec![0, 1]),
            Fold::new(vec![0, 3], vec![1, 2]),
        ];
        let result = train_kfold(
            &ConstBackend::default(),
            &config(),
            &data,
            None,
            FoldSource::splits(custom),
            &KFoldOptions::default(),
        )
        .unwrap();
        assert_eq!(result.oof, vec![1.0, 2.0, 2.0, 0.0]);
        assert_eq!(result.coverage, vec![1, 2, 1, 0]);
        assert_eq!(result.uncovered(), vec![3]);
    }

    #[test]
    fn disjoint_policy_rejects_overlap_before_training() {
        let data = dataset(4, &["a"]);
        let custom = vec![
            Fold::new(vec![2, 3], vec![0, 1]),
            Fold::new(vec![0, 3], vec![1, 2]),
        ];
        let backend = ConstBackend::default();
        let options = KFoldOptions {
            oof_policy: OofPolicy::Disjoint,
            ..KFoldOptions::default()
        };
        let err = train_kfold(&backend, &config(), &data, None, FoldSource::splits(custom), &options)
            .unwrap_err();
        assert!(matches!(err, TrainError::OverlappingValidation { fold: 1, index: 1 }));
        assert_eq!(backend.calls.get(), 1);
    }

    #[test]
    fn repeated_validation_index_is_an_invalid_fold() {
        let data = dataset(4, &["a"]);
        let custom = vec![Fold::new(vec![0, 2, 3], vec![1, 1])];
        let backend = ConstBackend::default();
        let options = KFoldOptions {
            oof_policy: OofPolicy::Disjoint,
            ..KFoldOptions::default()
        };
        let err = train_kfold(&backend, &config(), &data, None, FoldSource::splits(custom), &options)
            .unwrap_err();
        assert!(matches!(err, TrainError::InvalidFold { fold: 0, .. }));
        assert_eq!(backend.calls.get(), 0);
    }

    #[test]
    fn empty_split_sequence_is_rejected() {
        let data = dataset(4, &["a"]);
        let err = train_kfold(
            &ConstBackend::default(),
            &config(),
            &data,
            None,
            FoldSource::splits(Vec::new()),
            &KFoldOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TrainError::SplitExhaustion));
    }

    #[test]
    fn checks_fail_before_any_fold_trains() {
        let data = dataset(6, &["a", "b"]);
        let backend = ConstBackend::default();

        let bad_params = TrainConfig::new(RoundLimits::default(), false);
        assert!(matches!(
            train_kfold(&backend, &bad_params, &data, None, FoldSource::Count(2), &KFoldOptions::default()),
            Err(TrainError::InvalidConfig(_))
        ));

        let wide = Features::new(Array2::from_shape_vec((2, 3), vec![0.0; 6]).unwrap());
        assert!(matches!(
            train_kfold(&backend, &config(), &data, Some(&wide), FoldSource::Count(2), &KFoldOptions::default()),
            Err(TrainError::ShapeMismatch { .. })
        ));

        let unnamed = Features::new(Array2::from_shape_vec((2, 2), vec![0.0; 4]).unwrap());
        assert!(matches!(
            train_kfold(&backend, &config(), &data, Some(&unnamed), FoldSource::Count(2), &KFoldOptions::default()),
            Err(TrainError::ColumnReorderError(_))
        ));

        assert_eq!(backend.calls.get(), 0);
    }

    #[test]
    fn skip_checks_accepts_unnamed_test_set() {
        let data = dataset(6, &["a", "b"]);
        let unnamed = Features::new(Array2::from_shape_vec((2, 2), vec![0.0; 4]).unwrap());
        let options = KFoldOptions {
            skip_checks: true,
            ..KFoldOptions::default()
        };
        let result = train_kfold(
            &ConstBackend::default(),
            &config(),
            &data,
            Some(&unnamed),
            FoldSource::Count(2),
            &options,
        )
        .unwrap();
        assert_eq!(result.test_predictions.map(|p| p.len()), Some(2));
    }

    #[test]
    fn fold_failure_aborts_the_run() {
        let data = dataset(9, &["a"]);
        let backend = ConstBackend {
            fail_at: Some(1),
            ..ConstBackend::default()
        };
        let err = train_kfold(&backend, &config(), &data, None, FoldSource::Count(3), &KFoldOptions::default())
            .unwrap_err();
        assert!(matches!(err, TrainError::Backend(_)));
        assert_eq!(backend.calls.get(), 2);
    }

    #[test]
    fn invalid_importance_mode_is_a_config_error() {
        assert!(matches!(
            "invalid".parse::<ImportanceMode>(),
            Err(TrainError::InvalidConfig(_))
        ));
        let parsed: std::result::Result<KFoldOptions, _> =
            serde_json::from_str(r#"{"importance_mode": "invalid"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn stratify_labels_stay_out_of_serialized_options() {
        let options = KFoldOptions {
            stratify: Some(vec![0, 1, 0, 1]),
            ..KFoldOptions::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        assert!(!json.contains("stratify"), "{}", json);

        let parsed: KFoldOptions =
            serde_json::from_str(r#"{"stratify": [0, 1], "seed": 7}"#).unwrap();
        assert_eq!(parsed.stratify, None);
        assert_eq!(parsed.seed, 7);
    }
}
