pub mod backend;
pub mod booster;
pub mod tree;

pub use backend::{Importances, ModelBackend, TrainedModel, TrainingData};
pub use booster::{Booster, TreeBooster};
