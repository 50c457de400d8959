//! Model management
//!
//! Experiment tracking (runs, params, metrics, artifacts) and the model
//! registry that serving reads from.

pub mod registry;
pub mod tracking;

pub use registry::{ModelRegistry, ModelStatus, ModelVersion, RegisteredModel, VersionDetails};
pub use tracking::{
    ActiveRun, Experiment, MetricPoint, RunRecord, RunStatus, TrackingError, TrackingStore,
};
