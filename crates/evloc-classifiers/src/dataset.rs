//! Feature matrices, labelled datasets and name-based column alignment.
//!
//! Feature names are an explicit, optional attribute of [`Features`]. When
//! present they drive importance reporting and test-column reordering; when
//! absent columns are addressed by position and reported as `"0"`, `"1"`, ...
use std::collections::HashMap;

use crate::error::{Result, TrainError};
use crate::math::{Array1, Array2};

#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    x: Array2<f32>,
    names: Option<Vec<String>>,
}

impl Features {
    pub fn new(x: Array2<f32>) -> Self {
        Features { x, names: None }
    }

    pub fn with_names(x: Array2<f32>, names: Vec<String>) -> Result<Self> {
        if names.len() != x.ncols() {
            return Err(TrainError::ShapeMismatch {
                what: "feature names vs matrix columns",
                expected: x.ncols(),
                actual: names.len(),
            });
        }
        Ok(Features {
            x,
            names: Some(names),
        })
    }

    pub fn matrix(&self) -> &Array2<f32> {
        &self.x
    }

    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    pub fn nrows(&self) -> usize {
        self.x.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.x.ncols()
    }

    /// Names used for reporting: the real names or the column positions.
    pub fn reporting_names(&self) -> Vec<String> {
        match &self.names {
            Some(names) => names.clone(),
            None => (0..self.ncols()).map(|i| i.to_string()).collect(),
        }
    }

    /// Reorder columns so they follow `reference` by name.
    ///
    /// Fails when this frame carries no names or misses one of the reference
    /// columns. Extra columns not named in `reference` are dropped here;
    /// `train_kfold` rejects a width mismatch before it ever aligns.
    pub fn align_to(&self, reference: &[String]) -> Result<Features> {
        let Some(names) = &self.names else {
            return Err(TrainError::ColumnReorderError(
                "test features carry no column names".to_string(),
            ));
        };

        let lookup: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let order = reference
            .iter()
            .map(|name| {
                lookup.get(name.as_str()).copied().ok_or_else(|| {
                    TrainError::ColumnReorderError(format!("column '{}' not found", name))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        if order.iter().enumerate().all(|(i, &c)| i == c) && order.len() == names.len() {
            return Ok(self.clone());
        }

        log::debug!("Reordering test columns to match training order: {:?}", order);
        Ok(Features {
            x: self.x.select_columns(&order),
            names: Some(reference.to_vec()),
        })
    }
}

/// A labelled binary classification dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Features,
    pub labels: Array1<f32>,
    /// Group tokens, only consulted by group-aware splitters.
    pub groups: Option<Vec<String>>,
}

impl Dataset {
    pub fn new(features: Features, labels: Vec<f32>) -> Result<Self> {
        if labels.len() != features.nrows() {
            return Err(TrainError::ShapeMismatch {
                what: "labels vs feature rows",
                expected: features.nrows(),
                actual: labels.len(),
            });
        }
        if let Some((index, &value)) = labels
            .iter()
            .enumerate()
            .find(|&(_, &v)| v != 0.0 && v != 1.0)
        {
            return Err(TrainError::InvalidLabel {
                index,
                value: value as f64,
            });
        }
        Ok(Dataset {
            features,
            labels: Array1::from_vec(labels),
            groups: None,
        })
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Result<Self> {
        if groups.len() != self.len() {
            return Err(TrainError::ShapeMismatch {
                what: "groups vs feature rows",
                expected: self.len(),
                actual: groups.len(),
            });
        }
        self.groups = Some(groups);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels as integer classes, the form stratified splitting expects.
    pub fn classes(&self) -> Vec<i64> {
        self.labels.iter().map(|&v| v as i64).collect()
    }

    /// Materialize the rows at `indices` as a fresh matrix and label vector.
    pub fn subset(&self, indices: &[usize]) -> (Array2<f32>, Vec<f32>) {
        (
            self.features.matrix().select_rows(indices),
            self.labels.select(indices).into_vec(),
        )
    }

    pub fn log_summary(&self) {
        let positives = self.labels.iter().filter(|&&v| v == 1.0).count();
        log::info!(
            "Dataset: {} samples ({} positive, {} negative), {} features{}",
            self.len(),
            positives,
            self.len() - positives,
            self.features.ncols(),
            match &self.groups {
                Some(groups) => {
                    let mut unique: Vec<&String> = groups.iter().collect();
                    unique.sort();
                    unique.dedup();
                    format!(", {} groups", unique.len())
                }
                None => String::new(),
            }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn align_reorders_by_name() {
        let x = Array2::from_shape_vec((2, 3), vec![3.0, 1.0, 2.0, 6.0, 4.0, 5.0]).unwrap();
        let test = Features::with_names(x, names(&["c", "a", "b"])).unwrap();
        let aligned = test.align_to(&names(&["a", "b", "c"])).unwrap();
        assert_eq!(aligned.matrix().row_slice(0), &[1.0, 2.0, 3.0]);
        assert_eq!(aligned.matrix().row_slice(1), &[4.0, 5.0, 6.0]);
        assert_eq!(aligned.names().unwrap(), names(&["a", "b", "c"]).as_slice());
    }

    #[test]
    fn align_fails_on_missing_column() {
        let x = Array2::from_shape_vec((1, 2), vec![1.0, 2.0]).unwrap();
        let test = Features::with_names(x, names(&["a", "z"])).unwrap();
        assert!(matches!(
            test.align_to(&names(&["a", "b"])),
            Err(TrainError::ColumnReorderError(msg)) if msg.contains("'b'")
        ));
    }

    #[test]
    fn align_requires_names() {
        let x = Array2::from_shape_vec((1, 2), vec![1.0, 2.0]).unwrap();
        assert!(matches!(
            Features::new(x).align_to(&names(&["a", "b"])),
            Err(TrainError::ColumnReorderError(_))
        ));
    }

    #[test]
    fn dataset_rejects_non_binary_labels() {
        let x = Array2::from_shape_vec((2, 1), vec![1.0, 2.0]).unwrap();
        let err = Dataset::new(Features::new(x), vec![0.0, 2.0]).unwrap_err();
        assert!(matches!(err, TrainError::InvalidLabel { index: 1, .. }));
    }

    #[test]
    fn dataset_checks_row_counts() {
        let x = Array2::from_shape_vec((2, 1), vec![1.0, 2.0]).unwrap();
        let ds = Dataset::new(Features::new(x), vec![0.0, 1.0]).unwrap();
        assert!(matches!(
            ds.with_groups(vec!["g".to_string()]),
            Err(TrainError::ShapeMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn reporting_names_fall_back_to_positions() {
        let x = Array2::from_shape_vec((1, 3), vec![0.0; 3]).unwrap();
        assert_eq!(Features::new(x).reporting_names(), names(&["0", "1", "2"]));
    }
}
