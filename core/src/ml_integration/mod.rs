//! ML Integration Module
//!
//! Salary-band classification: dataset loading, feature encoding, model
//! training with experiment tracking, model registry, and prediction.
//!
//! # Architecture
//!
//! The module is organized into several submodules:
//! - `dataset`: CSV loading of the labeled dataset and the template data
//! - `encoder`: Standardized age plus one-hot encoded categorical features
//! - `metadata`: Core types for model metadata, metrics, and training config
//! - `metrics`: Classification metrics computed on the held-out split
//! - `models`: Trained classifiers and the serialized model artifact
//! - `trainer`: Fitting of the supported linfa classifiers
//! - `training`: Training sessions that log runs and register the best one
//! - `model_management`: File-backed tracking store and model registry
//! - `predictor`: Cached model serving with input validation
//! - `insights`: Chart figures and form options for the serving page
//!
//! # Usage
//!
//! ```rust,no_run
//! use salario_core::ml_integration::{ModelRegistry, TrackingStore, TrainingConfig, TrainingOrchestrator};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let registry = ModelRegistry::new(TrackingStore::open("mlruns")?);
//! let summary = TrainingOrchestrator::new(registry)
//!     .run(Path::new("data/dataset.csv"), &TrainingConfig::default())?;
//! println!("registered version {}", summary.registered_version);
//! # Ok(())
//! # }
//! ```

pub mod dataset;
pub mod encoder;
pub mod insights;
pub mod metadata;
pub mod metrics;
pub mod model_management;
pub mod models;
pub mod predictor;
pub mod trainer;
pub mod training;


pub use dataset::{
    load_dataset, load_template, DatasetError, LabeledDataset, SalaryRecord, TemplateData,
    TemplateSummary, FEATURE_COLUMNS,
};
pub use encoder::FeatureEncoder;
pub use insights::{probability_figure, salary_context_figure, FormOptions, SALARY_BANDS};
pub use metadata::{
    ClassificationMetrics, ModelMetadata, ModelType, RunOutcome, TrainingConfig, TrainingSummary,
    DEFAULT_EXPERIMENT, DEFAULT_LABEL_COLUMN, DEFAULT_REGISTERED_MODEL,
};
pub use model_management::{
    Experiment, ModelRegistry, ModelStatus, ModelVersion, RegisteredModel, RunRecord, RunStatus,
    TrackingError, TrackingStore,
};
pub use models::{SalaryClassifier, SalaryModel, MODEL_ARTIFACT};
pub use predictor::{
    clean_label, BandProbability, ModelInfo, PredictionError, PredictionRequest,
    PredictionResponse, PredictorConfig, SalaryPredictor,
};
pub use training::TrainingOrchestrator;
