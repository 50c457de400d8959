//! Model Training Methods
//!
//! Training implementations for the supported salary-band classifiers.

pub mod supervised;

pub use supervised::*;
