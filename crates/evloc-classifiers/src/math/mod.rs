//! Small ndarray-like types used throughout the crate.
//!
//! `Array2` is a row-major feature matrix and `Array1` a plain vector
//! wrapper. Both keep only the operations the training pipeline needs:
//! row/column gathering for fold subsets and test-column alignment.
pub mod matrix;
pub mod vector;

pub use matrix::{Array2, ShapeError};
pub use vector::Array1;
