//! Salario Core Module
//!
//! The core module provides the salary-band prediction engine: dataset
//! loading, classifier training with experiment tracking, the model
//! registry, and the cached predictor used by the web server.

pub mod config;
pub mod ml_integration;

pub use config::{ConfigFormat, ConfigManager, SalarioConfig};
pub use ml_integration::{
    ModelRegistry, PredictionError, PredictionRequest, PredictionResponse, SalaryPredictor,
    TrackingStore, TrainingConfig, TrainingOrchestrator, TrainingSummary,
};
