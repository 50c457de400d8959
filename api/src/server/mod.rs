//! API Server Module
//!
//! This module contains the server setup for the prediction server and the
//! tracking UI server.

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use salario_core::ml_integration::{ModelRegistry, SalaryPredictor};

use crate::handlers::{
    api_predict, context_chart, health_check, index, model_info, options, predict_form, reload,
    stats,
    tracking::{self, TrackingState},
    ApiState,
};
use crate::models::ApiConfig;

async fn serve(app: Router, config: &ApiConfig, name: &str) -> Result<()> {
    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {} to {}: {}", name, addr, e))?;
    info!("{} listening on http://{}", name, listener.local_addr()?);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start {}: {}", name, e))?;

    Ok(())
}

/// Prediction server
pub struct ApiServer {
    /// Server configuration
    config: ApiConfig,
    /// Shared state
    state: Arc<ApiState>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, predictor: Arc<SalaryPredictor>) -> Self {
        let state = Arc::new(ApiState {
            predictor,
            config: config.clone(),
        });

        Self { config, state }
    }

    /// Application router with the shared state
    pub fn router(&self) -> Router {
        Router::new()
            // Page
            .route("/", get(index))
            .route("/predict", post(predict_form))
            // JSON
            .route("/api/predict", post(api_predict))
            .route("/api/model", get(model_info))
            .route("/api/reload", post(reload))
            .route("/api/stats", get(stats))
            .route("/api/options", get(options))
            .route("/api/chart/context", get(context_chart))
            // Health check
            .route("/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Start the prediction server
    pub async fn start(&self) -> Result<()> {
        info!(
            "Starting Salario prediction server on {}:{}",
            self.config.host, self.config.port
        );
        serve(self.router(), &self.config, "Prediction server").await
    }
}

/// Tracking UI server
pub struct TrackingServer {
    config: ApiConfig,
    state: Arc<TrackingState>,
}

impl TrackingServer {
    pub fn new(config: ApiConfig, registry: ModelRegistry) -> Self {
        let state = Arc::new(TrackingState {
            registry,
            version: config.version.clone(),
        });

        Self { config, state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/experiments", get(tracking::list_experiments))
            .route("/api/runs", get(tracking::list_runs))
            .route("/api/runs/:run_id", get(tracking::get_run))
            .route("/api/models", get(tracking::list_models))
            .route("/api/models/:name", get(tracking::get_model))
            .route("/health", get(tracking::health_check))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Start the tracking UI server
    pub async fn start(&self) -> Result<()> {
        info!(
            "Starting Salario tracking UI on {}:{} (store {})",
            self.config.host,
            self.config.port,
            self.config.tracking_dir.display()
        );
        serve(self.router(), &self.config, "Tracking UI").await
    }
}
