//! Second-order regression trees fitted to logistic-loss gradients.
//!
//! Splits maximize the xgboost structure-score gain
//! `GL²/(HL+λ) + GR²/(HR+λ) - G²/(H+λ)` and must exceed `gamma`. Rows with a
//! missing (NaN) value follow the split's learned default direction.
use std::cmp::Ordering;

use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use crate::math::Array2;

const MIN_SPLIT_GAIN: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default)]
pub struct GradPair {
    pub grad: f64,
    pub hess: f64,
}

impl GradPair {
    fn add(&mut self, other: GradPair) {
        self.grad += other.grad;
        self.hess += other.hess;
    }

    fn sub(self, other: GradPair) -> GradPair {
        GradPair {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: u32,
    pub min_child_weight: f64,
    pub lambda: f64,
    pub gamma: f64,
    pub eta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Split {
        feature: usize,
        /// Rows with `value < threshold` go left.
        threshold: f32,
        default_left: bool,
        left: usize,
        right: usize,
        gain: f64,
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f32,
    default_left: bool,
    gain: f64,
}

impl SplitCandidate {
    /// Higher gain wins, ties go to the lower feature index.
    fn better(self, other: SplitCandidate) -> SplitCandidate {
        match self.gain.total_cmp(&other.gain) {
            Ordering::Greater => self,
            Ordering::Less => other,
            Ordering::Equal => {
                if self.feature <= other.feature {
                    self
                } else {
                    other
                }
            }
        }
    }
}

struct Builder<'a> {
    x: &'a Array2<f32>,
    grads: &'a [GradPair],
    level_features: &'a [Vec<usize>],
    params: &'a TreeParams,
    pool: &'a ThreadPool,
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Fit one tree on `rows` of `x`.
    ///
    /// `level_features[d]` lists the columns considered at depth `d`.
    pub fn fit(
        x: &Array2<f32>,
        grads: &[GradPair],
        rows: &[usize],
        level_features: &[Vec<usize>],
        params: &TreeParams,
        pool: &ThreadPool,
    ) -> RegressionTree {
        let mut builder = Builder {
            x,
            grads,
            level_features,
            params,
            pool,
            nodes: Vec::new(),
        };
        builder.build(rows.to_vec(), 0);
        RegressionTree {
            nodes: builder.nodes,
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn predict_row(&self, row: &[f32]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                    ..
                } => {
                    let value = row.get(*feature).copied().unwrap_or(f32::NAN);
                    let go_left = if value.is_nan() {
                        *default_left
                    } else {
                        value < *threshold
                    };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }
}

impl<'a> Builder<'a> {
    fn build(&mut self, rows: Vec<usize>, depth: u32) -> usize {
        let mut total = GradPair::default();
        for &r in &rows {
            total.add(self.grads[r]);
        }

        let can_split = depth < self.params.max_depth
            && rows.len() >= 2
            && total.hess >= 2.0 * self.params.min_child_weight;
        let split = if can_split {
            self.find_split(&rows, total, depth as usize)
        } else {
            None
        };

        let Some(split) = split else {
            let idx = self.nodes.len();
            self.nodes.push(TreeNode::Leaf {
                value: -total.grad / (total.hess + self.params.lambda) * self.params.eta,
                cover: total.hess,
            });
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows.iter().copied().partition(|&r| {
            let value = self.x[(r, split.feature)];
            if value.is_nan() {
                split.default_left
            } else {
                value < split.threshold
            }
        });

        let node_idx = self.nodes.len();
        // placeholder, replaced once both children exist
        self.nodes.push(TreeNode::Leaf {
            value: 0.0,
            cover: 0.0,
        });
        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);
        self.nodes[node_idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            default_left: split.default_left,
            left,
            right,
            gain: split.gain,
            cover: total.hess,
        };
        node_idx
    }

    fn find_split(&self, rows: &[usize], total: GradPair, depth: usize) -> Option<SplitCandidate> {
        let features = self.level_features.get(depth)?;
        self.pool.install(|| {
            features
                .par_iter()
                .filter_map(|&f| self.best_split_for(f, rows, total))
                .reduce_with(SplitCandidate::better)
        })
    }

    fn score(&self, g: GradPair) -> f64 {
        g.grad * g.grad / (g.hess + self.params.lambda)
    }

    fn best_split_for(&self, feature: usize, rows: &[usize], total: GradPair) -> Option<SplitCandidate> {
        let mut missing = GradPair::default();
        let mut present: Vec<(f32, GradPair)> = Vec::with_capacity(rows.len());
        for &r in rows {
            let value = self.x[(r, feature)];
            if value.is_nan() {
                missing.add(self.grads[r]);
            } else {
                present.push((value, self.grads[r]));
            }
        }
        if present.len() < 2 {
            return None;
        }
        present.sort_by(|a, b| a.0.total_cmp(&b.0));

        let parent = self.score(total);
        let min_child = self.params.min_child_weight;
        let has_missing = missing.hess > 0.0;

        let mut best: Option<SplitCandidate> = None;
        let mut prefix = GradPair::default();
        for i in 0..present.len() - 1 {
            prefix.add(present[i].1);
            if present[i].0 == present[i + 1].0 {
                continue;
            }

            let directions: &[bool] = if has_missing { &[true, false] } else { &[true] };
            for &default_left in directions {
                let left = if default_left {
                    GradPair {
                        grad: prefix.grad + missing.grad,
                        hess: prefix.hess + missing.hess,
                    }
                } else {
                    prefix
                };
                let right = total.sub(left);
                if left.hess < min_child || right.hess < min_child {
                    continue;
                }

                let gain = self.score(left) + self.score(right) - parent;
                if gain <= self.params.gamma || gain <= MIN_SPLIT_GAIN {
                    continue;
                }
                let candidate = SplitCandidate {
                    feature,
                    threshold: present[i + 1].0,
                    default_left,
                    gain,
                };
                best = Some(match best {
                    Some(current) if current.gain >= gain => current,
                    _ => candidate,
                });
            }
        }
        best
    }
}
