pub mod dataset_csv;
pub mod store;

pub use dataset_csv::{dataset_path, read_dataset_csv, read_dataset_csv_with_config, DatasetReaderConfig};
pub use store::{ModelStore, ScoreLog};
