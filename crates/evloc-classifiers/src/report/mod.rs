pub mod importance;

pub use importance::{format_importances, ranked};
