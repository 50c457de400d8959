//! API Models
//!
//! Configuration and request/response types shared by the servers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use salario_core::ml_integration::{
    ClassificationMetrics, FormOptions, ModelInfo, PredictionResponse, TemplateSummary,
};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub version: String,
    /// Shown in the hint when no model can be loaded
    pub tracking_dir: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            version: env!("CARGO_PKG_VERSION").to_string(),
            tracking_dir: PathBuf::from("mlruns"),
        }
    }
}

impl ApiConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Error body of every failed JSON request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// `GET /api/model`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    #[serde(flatten)]
    pub info: ModelInfo,
}

/// `GET /api/stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub summary: TemplateSummary,
}

/// `GET /api/options`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsResponse {
    #[serde(flatten)]
    pub options: FormOptions,
}

/// `POST /api/predict`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(flatten)]
    pub prediction: PredictionResponse,
    /// Plotly figure of the per-band probabilities
    pub chart: serde_json::Value,
}

/// `GET /api/runs` query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunsQuery {
    /// Experiment name or id; every experiment when absent
    pub experiment: Option<String>,
}

/// Compact run row of the tracking UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub experiment_id: String,
    pub run_name: String,
    pub status: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub metrics: std::collections::BTreeMap<String, f64>,
}

/// Registered model row of the tracking UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredModelSummary {
    pub name: String,
    pub latest_version: Option<u32>,
    pub versions: usize,
    pub latest_metrics: Option<ClassificationMetrics>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
