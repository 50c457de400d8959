//! API Handlers Module
//!
//! This module contains the request handlers of the prediction server.

use axum::{
    debug_handler,
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use salario_core::ml_integration::{
    probability_figure, salary_context_figure, FormOptions, PredictionError, PredictionRequest,
    SalaryPredictor, TrackingError,
};

use crate::models::{
    ApiConfig, ErrorResponse, HealthResponse, ModelResponse, OptionsResponse, PredictResponse,
    StatsResponse,
};
use crate::page::{self, Outcome, PageView};

pub mod tracking;

/// Represents the state of the prediction server
pub struct ApiState {
    pub predictor: Arc<SalaryPredictor>,
    pub config: ApiConfig,
}

/// Handler error rendered as a JSON body with a matching status code
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{message}")]
    Unavailable {
        message: String,
        hint: Option<String>,
    },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn from_prediction(error: PredictionError, tracking_dir: &Path) -> Self {
        match error {
            e if e.is_invalid_input() => ApiError::Unprocessable(e.to_string()),
            e @ PredictionError::ModelUnavailable { .. } => ApiError::Unavailable {
                message: e.to_string(),
                hint: Some(model_hint(tracking_dir)),
            },
            e @ PredictionError::TemplateUnavailable(_) => ApiError::Unavailable {
                message: e.to_string(),
                hint: None,
            },
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<TrackingError> for ApiError {
    fn from(error: TrackingError) -> Self {
        match error {
            TrackingError::ExperimentNotFound(_)
            | TrackingError::RunNotFound(_)
            | TrackingError::ArtifactNotFound { .. }
            | TrackingError::ModelNotFound(_)
            | TrackingError::VersionNotFound { .. } => ApiError::NotFound(error.to_string()),
            TrackingError::InvalidName(_) => ApiError::BadRequest(error.to_string()),
            _ => ApiError::Internal(error.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        let hint = match &self {
            ApiError::Unavailable { hint, .. } => hint.clone(),
            _ => None,
        };
        let body = ErrorResponse {
            error: self.to_string(),
            hint,
        };
        (status, Json(body)).into_response()
    }
}

/// Hint shown when no model could be loaded
pub fn model_hint(tracking_dir: &Path) -> String {
    format!(
        "Verifique se um modelo foi treinado e registrado em {} (salario train)",
        tracking_dir.display()
    )
}

fn today() -> String {
    chrono::Local::now().format("%d/%m/%Y").to_string()
}

/// Health check endpoint
#[debug_handler]
pub async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "salario-api".to_string(),
        version: state.config.version.clone(),
    })
}

async fn render(
    state: &ApiState,
    submitted: Option<&PredictionRequest>,
    show_chart: bool,
) -> Response {
    let loaded = async {
        let template = state.predictor.load_template().await?;
        let model = state.predictor.load_model().await?;
        Ok::<_, PredictionError>((template, model))
    }
    .await;

    let (template, model) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Prediction page unavailable: {}", e);
            let hint = match &e {
                PredictionError::ModelUnavailable { .. } => model_hint(&state.config.tracking_dir),
                _ => "Verifique o arquivo de template configurado (data/template.csv)".to_string(),
            };
            let html = page::render_error_page(&e.to_string(), &hint);
            return (StatusCode::SERVICE_UNAVAILABLE, Html(html)).into_response();
        }
    };

    let prediction = match submitted {
        Some(request) => Some(state.predictor.predict(request).await),
        None => None,
    };
    let outcome = match &prediction {
        Some(Ok(response)) => Some(Outcome::Prediction(response)),
        Some(Err(e)) => {
            tracing::error!("Prediction failed: {}", e);
            Some(Outcome::Failure(e.to_string()))
        }
        None => None,
    };

    let stats = template.summary();
    let options = FormOptions::from_template(&template);
    let html = page::render_page(&PageView {
        model_version: model.version.version,
        today: today(),
        stats: &stats,
        options: &options,
        submitted,
        outcome,
        show_chart,
    });
    Html(html).into_response()
}

/// Prediction form
pub async fn index(State(state): State<Arc<ApiState>>) -> Response {
    render(&state, None, false).await
}

/// Form submission; re-renders the page with the result
pub async fn predict_form(
    State(state): State<Arc<ApiState>>,
    Form(mut fields): Form<HashMap<String, String>>,
) -> Response {
    let show_chart = fields.remove("show_chart").is_some();
    tracing::debug!("Form prediction with {} fields", fields.len());
    let request = PredictionRequest::from_pairs(fields);
    render(&state, Some(&request), show_chart).await
}

/// JSON prediction
#[debug_handler]
pub async fn api_predict(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<PredictionRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let prediction = state
        .predictor
        .predict(&request)
        .await
        .map_err(|e| ApiError::from_prediction(e, &state.config.tracking_dir))?;
    let chart = probability_figure(&prediction.probabilities);
    Ok(Json(PredictResponse { prediction, chart }))
}

/// Served model version and metadata
#[debug_handler]
pub async fn model_info(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ModelResponse>, ApiError> {
    let info = state
        .predictor
        .model_info()
        .await
        .map_err(|e| ApiError::from_prediction(e, &state.config.tracking_dir))?;
    Ok(Json(ModelResponse { info }))
}

/// Drop the cached model and template, then report the model now served
#[debug_handler]
pub async fn reload(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ModelResponse>, ApiError> {
    state.predictor.invalidate().await;
    let info = state
        .predictor
        .model_info()
        .await
        .map_err(|e| ApiError::from_prediction(e, &state.config.tracking_dir))?;
    tracing::info!("Reloaded model version {}", info.version);
    Ok(Json(ModelResponse { info }))
}

/// Template statistics
#[debug_handler]
pub async fn stats(State(state): State<Arc<ApiState>>) -> Result<Json<StatsResponse>, ApiError> {
    let template = state
        .predictor
        .load_template()
        .await
        .map_err(|e| ApiError::from_prediction(e, &state.config.tracking_dir))?;
    Ok(Json(StatsResponse {
        summary: template.summary(),
    }))
}

/// Form option lists
#[debug_handler]
pub async fn options(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<OptionsResponse>, ApiError> {
    let template = state
        .predictor
        .load_template()
        .await
        .map_err(|e| ApiError::from_prediction(e, &state.config.tracking_dir))?;
    Ok(Json(OptionsResponse {
        options: FormOptions::from_template(&template),
    }))
}

/// Salary context chart as Plotly JSON
pub async fn context_chart() -> Json<Value> {
    Json(salary_context_figure())
}
