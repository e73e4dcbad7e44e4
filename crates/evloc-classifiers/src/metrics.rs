use crate::config::EvalMetric;

const EPS: f64 = 1e-15;

/// Mean binary cross-entropy of probabilities against 0/1 labels.
pub fn log_loss(labels: &[f32], probs: &[f64]) -> f64 {
    assert_eq!(labels.len(), probs.len(), "labels and predictions must have equal lengths");
    if labels.is_empty() {
        return f64::NAN;
    }
    let total: f64 = labels
        .iter()
        .zip(probs)
        .map(|(&y, &p)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            -(y as f64 * p.ln() + (1.0 - y as f64) * (1.0 - p).ln())
        })
        .sum();
    total / labels.len() as f64
}

/// Fraction of samples misclassified at a 0.5 probability threshold.
pub fn error_rate(labels: &[f32], probs: &[f64]) -> f64 {
    assert_eq!(labels.len(), probs.len(), "labels and predictions must have equal lengths");
    if labels.is_empty() {
        return f64::NAN;
    }
    let wrong = labels
        .iter()
        .zip(probs)
        .filter(|&(&y, &p)| (p > 0.5) != (y == 1.0))
        .count();
    wrong as f64 / labels.len() as f64
}

/// Area under the ROC curve, ties counted as half.
///
/// Returns 0.5 when only one class is present.
pub fn auc(labels: &[f32], scores: &[f64]) -> f64 {
    assert_eq!(labels.len(), scores.len(), "labels and predictions must have equal lengths");

    let mut combined: Vec<(f64, bool)> = scores
        .iter()
        .copied()
        .zip(labels.iter().map(|&y| y == 1.0))
        .collect();
    combined.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total_pos = combined.iter().filter(|(_, pos)| *pos).count() as f64;
    let total_neg = combined.len() as f64 - total_pos;
    if total_pos == 0.0 || total_neg == 0.0 {
        return 0.5;
    }

    // Mann-Whitney U over average ranks.
    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < combined.len() {
        let mut j = i;
        while j < combined.len() && combined[j].0 == combined[i].0 {
            j += 1;
        }
        let avg_rank = (i + j + 1) as f64 / 2.0;
        let positives = combined[i..j].iter().filter(|(_, pos)| *pos).count() as f64;
        rank_sum += avg_rank * positives;
        i = j;
    }

    (rank_sum - total_pos * (total_pos + 1.0) / 2.0) / (total_pos * total_neg)
}

/// Score used for early stopping: lower is always better.
///
/// AUC is negated so that every metric shares the minimization convention.
pub fn evaluate(metric: EvalMetric, labels: &[f32], probs: &[f64]) -> f64 {
    match metric {
        EvalMetric::LogLoss => log_loss(labels, probs),
        EvalMetric::Error => error_rate(labels, probs),
        EvalMetric::Auc => -auc(labels, probs),
    }
}
