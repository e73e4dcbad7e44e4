//! Per-class training CSV reader.
//!
//! One header row; a 0/1 label column, an optional group column and every
//! remaining (non-ignored) column as a numeric feature. Empty cells are read
//! as missing (NaN); infinite values are rejected since they cannot be
//! stored in the JSON model files.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;

use crate::dataset::{Dataset, Features};
use crate::math::Array2;

#[derive(Debug, Clone)]
pub struct DatasetReaderConfig {
    pub label_column: String,
    /// Column holding group tokens. Ignored when absent from the file.
    pub group_column: Option<String>,
    /// Columns never used as features.
    pub ignore_columns: Vec<String>,
    pub delimiter: u8,
}

impl Default for DatasetReaderConfig {
    fn default() -> Self {
        Self {
            label_column: "label".to_string(),
            group_column: Some("group".to_string()),
            ignore_columns: vec!["id".to_string(), "index".to_string()],
            delimiter: b',',
        }
    }
}

/// `<data_dir>/cls_<class_id>.csv`
pub fn dataset_path<P: AsRef<Path>>(data_dir: P, class_id: u32) -> PathBuf {
    data_dir.as_ref().join(format!("cls_{}.csv", class_id))
}

pub fn read_dataset_csv<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    read_dataset_csv_with_config(path, &DatasetReaderConfig::default())
}

pub fn read_dataset_csv_with_config<P: AsRef<Path>>(
    path: P,
    config: &DatasetReaderConfig,
) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(true)
        .from_path(&path)
        .with_context(|| format!("Failed to open dataset file: {}", path.as_ref().display()))?;

    let headers = reader
        .headers()
        .context("Failed to read dataset header row")?
        .clone();

    let label_idx = find_column(&headers, &config.label_column)
        .ok_or_else(|| anyhow!("Missing label column '{}'", config.label_column))?;
    let group_idx = config
        .group_column
        .as_deref()
        .and_then(|name| find_column(&headers, name));

    let ignore: HashSet<String> = config
        .ignore_columns
        .iter()
        .map(|name| name.to_ascii_lowercase())
        .collect();
    let feature_indices: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|&(idx, header)| {
            idx != label_idx
                && Some(idx) != group_idx
                && !ignore.contains(&header.to_ascii_lowercase())
        })
        .map(|(idx, _)| idx)
        .collect();
    if feature_indices.is_empty() {
        return Err(anyhow!("No feature columns detected in dataset header"));
    }

    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut groups = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let label = record
            .get(label_idx)
            .ok_or_else(|| anyhow!("Missing label value at row {}", row_idx + 1))?
            .trim()
            .parse::<f32>()
            .with_context(|| format!("Invalid label at row {}", row_idx + 1))?;
        labels.push(label);

        if let Some(idx) = group_idx {
            groups.push(record.get(idx).unwrap_or_default().trim().to_string());
        }

        for &idx in &feature_indices {
            let value = record
                .get(idx)
                .ok_or_else(|| anyhow!("Missing feature value at row {}", row_idx + 1))?
                .trim();
            let parsed = if value.is_empty() {
                f32::NAN
            } else {
                value.parse::<f32>().with_context(|| {
                    format!(
                        "Invalid feature '{}' at row {}",
                        headers.get(idx).unwrap_or(""),
                        row_idx + 1
                    )
                })?
            };
            if parsed.is_infinite() {
                return Err(anyhow!(
                    "Non-finite feature '{}' at row {}: {}",
                    headers.get(idx).unwrap_or(""),
                    row_idx + 1,
                    value
                ));
            }
            features.push(parsed);
        }
    }

    let x = Array2::from_shape_vec((labels.len(), feature_indices.len()), features)
        .context("Failed to build feature matrix")?;
    let names = feature_indices
        .iter()
        .map(|&idx| headers.get(idx).unwrap_or("").to_string())
        .collect();

    let features = Features::with_names(x, names)?;
    let dataset = Dataset::new(features, labels)?;
    let dataset = match group_idx {
        Some(_) => dataset.with_groups(groups)?,
        None => dataset,
    };

    log::debug!(
        "Read {} rows with {} features from {}",
        dataset.len(),
        dataset.features.ncols(),
        path.as_ref().display()
    );
    Ok(dataset)
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_labels_groups_and_named_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = dataset_path(dir.path(), 7);
        fs::write(
            &path,
            "id,dist,label,energy,group\n0,1.5,1,0.25,evt1\n1,,0,0.5,evt2\n",
        )
        .unwrap();

        let data = read_dataset_csv(&path).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.features.names().unwrap(), &["dist".to_string(), "energy".to_string()]);
        assert_eq!(data.labels.iter().copied().collect::<Vec<_>>(), vec![1.0, 0.0]);
        assert_eq!(data.groups, Some(vec!["evt1".to_string(), "evt2".to_string()]));
        assert!(data.features.matrix()[(1, 0)].is_nan());
        assert_eq!(data.features.matrix()[(1, 1)], 0.5);
    }

    #[test]
    fn group_column_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.csv");
        fs::write(&path, "a,label\n1,0\n2,1\n").unwrap();
        let data = read_dataset_csv(&path).unwrap();
        assert!(data.groups.is_none());
        assert_eq!(data.features.ncols(), 1);
    }

    #[test]
    fn rejects_missing_label_and_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let no_label = dir.path().join("no_label.csv");
        fs::write(&no_label, "a,b\n1,2\n").unwrap();
        assert!(read_dataset_csv(&no_label).is_err());

        let bad_label = dir.path().join("bad_label.csv");
        fs::write(&bad_label, "a,label\n1,2\n").unwrap();
        assert!(read_dataset_csv(&bad_label).is_err());

        let bad_value = dir.path().join("bad_value.csv");
        fs::write(&bad_value, "a,label\nxyz,1\n").unwrap();
        assert!(read_dataset_csv(&bad_value).is_err());
    }

    #[test]
    fn rejects_infinite_feature_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inf.csv");
        fs::write(&path, "dist,energy,label\n0.5,1,0\n0.25,-inf,1\n").unwrap();
        let err = read_dataset_csv(&path).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("'energy' at row 2"), "{}", message);

        let nan_ok = dir.path().join("nan.csv");
        fs::write(&nan_ok, "dist,label\nNaN,0\n1,1\n").unwrap();
        assert!(read_dataset_csv(&nan_ok).unwrap().features.matrix()[(0, 0)].is_nan());
    }

    #[test]
    fn dataset_path_follows_class_template() {
        assert_eq!(
            dataset_path("/data", 12),
            PathBuf::from("/data").join("cls_12.csv")
        );
    }
}
