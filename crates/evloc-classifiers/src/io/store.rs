//! Score log and model blob persistence.
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Append-only `class,mean_score` log shared by every run.
#[derive(Debug, Clone)]
pub struct ScoreLog {
    path: PathBuf,
}

impl ScoreLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ScoreLog {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, class_id: u32, mean_score: f64) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open score log: {}", self.path.display()))?;
        writeln!(file, "{},{}", class_id, mean_score)
            .with_context(|| format!("Failed to append to score log: {}", self.path.display()))?;
        Ok(())
    }
}

/// Writes `(class_id, models)` as JSON under
/// `<dir>/<prefix>_<class>_<score:.5>.json`.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
    prefix: String,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(dir: P, prefix: impl Into<String>) -> Self {
        ModelStore {
            dir: dir.as_ref().to_path_buf(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, class_id: u32, mean_score: f64) -> PathBuf {
        self.dir
            .join(format!("{}_{}_{:.5}.json", self.prefix, class_id, mean_score))
    }

    pub fn save<M: Serialize>(&self, class_id: u32, mean_score: f64, models: &[M]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create model directory: {}", self.dir.display()))?;

        let path = self.path_for(class_id, mean_score);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create model file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &(class_id, models))
            .with_context(|| format!("Failed to serialize models to {}", path.display()))?;
        writer.flush()?;

        log::info!("Saved {} models to {}", models.len(), path.display());
        Ok(path)
    }

    pub fn load<M: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<(u32, Vec<M>)> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open model file: {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse model file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = ScoreLog::new(dir.path().join("scores.csv"));
        log.append(3, 0.125).unwrap();
        log.append(4, 0.5).unwrap();
        let contents = fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents, "3,0.125\n4,0.5\n");
    }

    #[test]
    fn model_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("models"), "xgb4");
        let path = store.save(9, 0.123456, &[1u32, 2, 3]).unwrap();
        assert_eq!(path.file_name().unwrap(), "xgb4_9_0.12346.json");

        let (class_id, models): (u32, Vec<u32>) = ModelStore::load(&path).unwrap();
        assert_eq!(class_id, 9);
        assert_eq!(models, vec![1, 2, 3]);
    }
}
