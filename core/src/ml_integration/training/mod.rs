//! Training sessions

pub mod orchestrator;

pub use orchestrator::{select_best, TrainingOrchestrator};
