use std::cmp::Ordering;

use crate::models::Importances;

/// Importances sorted by descending score, ties broken by feature name.
pub fn ranked(importances: &Importances) -> Vec<(&str, f64)> {
    let mut ranked: Vec<(&str, f64)> = importances
        .iter()
        .map(|(name, &score)| (name.as_str(), score))
        .collect();
    ranked.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => a.0.cmp(b.0),
        other => other,
    });
    ranked
}

/// One-line rendering of [`ranked`], e.g. `[("dist", 12), ("energy", 3.5)]`.
pub fn format_importances(importances: &Importances) -> String {
    let entries: Vec<String> = ranked(importances)
        .into_iter()
        .map(|(name, score)| format!("(\"{}\", {})", name, score))
        .collect();
    format!("[{}]", entries.join(", "))
}
