//! Fold generation for cross-validation.
//!
//! Generated splits are driven by a caller-supplied seed through
//! `StdRng::seed_from_u64`, so the same seed and inputs always give the same
//! folds. Every splitter returns a lazy, single-pass iterator of [`Fold`]s.
use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Result, TrainError};

/// One train/validation index partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

impl Fold {
    pub fn new(train: Vec<usize>, valid: Vec<usize>) -> Self {
        Fold { train, valid }
    }

    /// Check the fold against a dataset of `n` samples.
    pub fn validate(&self, fold: usize, n: usize) -> Result<()> {
        let invalid = |reason: String| Err(TrainError::InvalidFold { fold, reason });

        if self.train.is_empty() {
            return invalid("empty training set".to_string());
        }
        if self.valid.is_empty() {
            return invalid("empty validation set".to_string());
        }
        if let Some(&idx) = self.train.iter().chain(&self.valid).find(|&&i| i >= n) {
            return invalid(format!("index {} out of range for {} samples", idx, n));
        }

        let mut in_train = vec![false; n];
        for &i in &self.train {
            in_train[i] = true;
        }
        if let Some(&idx) = self.valid.iter().find(|&&i| in_train[i]) {
            return invalid(format!("index {} is in both train and validation", idx));
        }

        let mut in_valid = vec![false; n];
        for &i in &self.valid {
            if in_valid[i] {
                return invalid(format!("index {} repeats in validation", i));
            }
            in_valid[i] = true;
        }
        Ok(())
    }
}

pub type FoldIter = Box<dyn Iterator<Item = Fold>>;

/// Where the folds of a cross-validation run come from.
pub enum FoldSource {
    /// Generate this many shuffled (optionally stratified) folds.
    Count(usize),
    /// Use a pre-built split sequence verbatim. Consumed once.
    Splits(FoldIter),
}

impl FoldSource {
    pub fn splits<I>(folds: I) -> Self
    where
        I: IntoIterator<Item = Fold>,
        I::IntoIter: 'static,
    {
        FoldSource::Splits(Box::new(folds.into_iter()))
    }
}

impl From<usize> for FoldSource {
    fn from(k: usize) -> Self {
        FoldSource::Count(k)
    }
}

impl Default for FoldSource {
    fn default() -> Self {
        FoldSource::Count(5)
    }
}

impl fmt::Debug for FoldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FoldSource::Count(k) => write!(f, "Count({})", k),
            FoldSource::Splits(_) => write!(f, "Splits(..)"),
        }
    }
}

/// Resolve a [`FoldSource`] into a lazy fold sequence for `n` samples.
///
/// With `Count(k)` a stratified split is generated when `stratify` is given,
/// a plain shuffled k-fold otherwise. `Splits` is returned as is.
pub fn split(n: usize, stratify: Option<&[i64]>, folds: FoldSource, seed: u64) -> Result<FoldIter> {
    match folds {
        FoldSource::Splits(iter) => Ok(iter),
        FoldSource::Count(k) => match stratify {
            Some(classes) if classes.len() != n => Err(TrainError::ShapeMismatch {
                what: "stratification labels vs samples",
                expected: n,
                actual: classes.len(),
            }),
            Some(classes) => Ok(Box::new(StratifiedKFold::new(k, seed).split(classes)?)),
            None => Ok(Box::new(KFold::new(k, seed).split(n)?)),
        },
    }
}

fn check_n_splits(n_splits: usize, n: usize) -> Result<()> {
    if n_splits < 2 {
        return Err(TrainError::InvalidConfig(format!(
            "number of folds must be at least 2, got {}",
            n_splits
        )));
    }
    if n_splits > n {
        return Err(TrainError::InvalidConfig(format!(
            "cannot have {} folds with only {} samples",
            n_splits, n
        )));
    }
    Ok(())
}

/// Emits fold `k` as the samples assigned to `k`, training on the rest.
pub struct AssignedFolds {
    assignment: Vec<usize>,
    n_splits: usize,
    current: usize,
}

impl Iterator for AssignedFolds {
    type Item = Fold;

    fn next(&mut self) -> Option<Fold> {
        if self.current >= self.n_splits {
            return None;
        }
        let k = self.current;
        self.current += 1;

        let (valid, train): (Vec<usize>, Vec<usize>) =
            (0..self.assignment.len()).partition(|&i| self.assignment[i] == k);
        Some(Fold { train, valid })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.n_splits - self.current;
        (left, Some(left))
    }
}

/// Shuffled k-fold: a seeded permutation cut into `n_splits` contiguous
/// chunks, the first `n % n_splits` chunks one sample larger.
#[derive(Debug, Clone)]
pub struct KFold {
    pub n_splits: usize,
    pub seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        KFold { n_splits, seed }
    }

    pub fn split(&self, n: usize) -> Result<AssignedFolds> {
        check_n_splits(self.n_splits, n)?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut permutation: Vec<usize> = (0..n).collect();
        permutation.shuffle(&mut rng);

        let base = n / self.n_splits;
        let extra = n % self.n_splits;
        let mut assignment = vec![0; n];
        let mut start = 0;
        for k in 0..self.n_splits {
            let size = base + usize::from(k < extra);
            for &idx in &permutation[start..start + size] {
                assignment[idx] = k;
            }
            start += size;
        }

        Ok(AssignedFolds {
            assignment,
            n_splits: self.n_splits,
            current: 0,
        })
    }
}

/// Stratified k-fold keeping class proportions per fold.
///
/// Samples are grouped by class (classes in sorted order), each class is
/// shuffled, and the concatenated list is dealt round-robin across folds.
/// Per-class counts and overall fold sizes each differ by at most one.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        StratifiedKFold { n_splits, seed }
    }

    pub fn split(&self, classes: &[i64]) -> Result<AssignedFolds> {
        let n = classes.len();
        check_n_splits(self.n_splits, n)?;

        let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &c) in classes.iter().enumerate() {
            by_class.entry(c).or_default().push(i);
        }
        if let Some((class, members)) = by_class.iter().find(|(_, m)| m.len() < self.n_splits) {
            log::warn!(
                "Class {} has only {} members, fewer than {} folds",
                class,
                members.len(),
                self.n_splits
            );
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut assignment = vec![0; n];
        let mut position = 0;
        for members in by_class.values_mut() {
            members.shuffle(&mut rng);
            for &idx in members.iter() {
                assignment[idx] = position % self.n_splits;
                position += 1;
            }
        }

        Ok(AssignedFolds {
            assignment,
            n_splits: self.n_splits,
            current: 0,
        })
    }
}

/// Random group-level splits: every sample of a group lands on the same side.
///
/// Each split draws `ceil(test_size * n_groups)` validation groups
/// independently, so validation sets of different splits may overlap and
/// need not cover every sample.
#[derive(Debug, Clone)]
pub struct GroupShuffleSplit {
    pub n_splits: usize,
    pub test_size: f64,
    pub seed: u64,
}

impl GroupShuffleSplit {
    pub fn new(n_splits: usize, test_size: f64, seed: u64) -> Self {
        GroupShuffleSplit {
            n_splits,
            test_size,
            seed,
        }
    }

    pub fn split<G: Ord>(&self, groups: &[G]) -> Result<GroupShuffleFolds> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(TrainError::InvalidConfig(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }

        let mut unique: Vec<&G> = groups.iter().collect();
        unique.sort();
        unique.dedup();
        let n_groups = unique.len();
        if n_groups < 2 {
            return Err(TrainError::InvalidConfig(format!(
                "group shuffle split needs at least 2 groups, got {}",
                n_groups
            )));
        }

        let group_of = groups
            .iter()
            .map(|g| unique.binary_search(&g).unwrap_or_default())
            .collect();
        let n_test = ((self.test_size * n_groups as f64).ceil() as usize).clamp(1, n_groups - 1);

        Ok(GroupShuffleFolds {
            group_of,
            n_groups,
            n_test,
            remaining: self.n_splits,
            rng: StdRng::seed_from_u64(self.seed),
        })
    }
}

pub struct GroupShuffleFolds {
    group_of: Vec<usize>,
    n_groups: usize,
    n_test: usize,
    remaining: usize,
    rng: StdRng,
}

impl Iterator for GroupShuffleFolds {
    type Item = Fold;

    fn next(&mut self) -> Option<Fold> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let mut order: Vec<usize> = (0..self.n_groups).collect();
        order.shuffle(&mut self.rng);
        let mut is_valid_group = vec![false; self.n_groups];
        for &g in &order[..self.n_test] {
            is_valid_group[g] = true;
        }

        let (valid, train): (Vec<usize>, Vec<usize>) =
            (0..self.group_of.len()).partition(|&i| is_valid_group[self.group_of[i]]);
        Some(Fold { train, valid })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
