//! Tracking UI handlers
//!
//! Read-only views over experiments, runs and registered models.

use axum::{
    debug_handler,
    extract::{Path, Query, State},
    response::Json,
};
use std::sync::Arc;

use salario_core::ml_integration::{
    Experiment, ModelRegistry, RegisteredModel, RunRecord, TrackingError, TrackingStore,
};

use super::ApiError;
use crate::models::{HealthResponse, RegisteredModelSummary, RunSummary, RunsQuery};

/// Represents the state of the tracking UI server
pub struct TrackingState {
    pub registry: ModelRegistry,
    pub version: String,
}

impl TrackingState {
    fn store(&self) -> &TrackingStore {
        self.registry.store()
    }
}

/// Run a blocking store operation off the async workers
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, TrackingError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

fn summarize(run: RunRecord) -> RunSummary {
    RunSummary {
        metrics: run.latest_metrics(),
        status: format!("{:?}", run.status),
        run_id: run.run_id,
        experiment_id: run.experiment_id,
        run_name: run.run_name,
        start_time: run.start_time,
        end_time: run.end_time,
    }
}

/// Resolve an experiment by id first, then by name
fn find_experiment(store: &TrackingStore, key: &str) -> Result<Experiment, TrackingError> {
    match store.get_experiment(key) {
        Ok(experiment) => Ok(experiment),
        Err(TrackingError::ExperimentNotFound(_)) => store
            .get_experiment_by_name(key)?
            .ok_or_else(|| TrackingError::ExperimentNotFound(key.to_string())),
        Err(e) => Err(e),
    }
}

#[debug_handler]
pub async fn health_check(State(state): State<Arc<TrackingState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "salario-tracking".to_string(),
        version: state.version.clone(),
    })
}

#[debug_handler]
pub async fn list_experiments(
    State(state): State<Arc<TrackingState>>,
) -> Result<Json<Vec<Experiment>>, ApiError> {
    let store = state.store().clone();
    let experiments = blocking(move || store.list_experiments()).await?;
    Ok(Json(experiments))
}

/// Runs of one experiment (`?experiment=<id or name>`) or of all of them
#[debug_handler]
pub async fn list_runs(
    State(state): State<Arc<TrackingState>>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<Vec<RunSummary>>, ApiError> {
    tracing::debug!("Listing runs for {:?}", query.experiment);
    let store = state.store().clone();
    let runs = blocking(move || {
        let experiments = match &query.experiment {
            Some(key) => vec![find_experiment(&store, key)?],
            None => store.list_experiments()?,
        };
        let mut runs = Vec::new();
        for experiment in experiments {
            runs.extend(store.list_runs(&experiment.experiment_id)?);
        }
        runs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(runs)
    })
    .await?;
    Ok(Json(runs.into_iter().map(summarize).collect()))
}

#[debug_handler]
pub async fn get_run(
    State(state): State<Arc<TrackingState>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunRecord>, ApiError> {
    let store = state.store().clone();
    let run = blocking(move || store.get_run(&run_id)).await?;
    Ok(Json(run))
}

#[debug_handler]
pub async fn list_models(
    State(state): State<Arc<TrackingState>>,
) -> Result<Json<Vec<RegisteredModelSummary>>, ApiError> {
    let registry = state.registry.clone();
    let models = blocking(move || registry.list_registered_models()).await?;
    let summaries = models
        .into_iter()
        .map(|model| {
            let latest = model.latest_version();
            RegisteredModelSummary {
                latest_version: latest.map(|v| v.version),
                latest_metrics: latest.and_then(|v| v.metrics.clone()),
                versions: model.versions.len(),
                updated_at: model.updated_at,
                name: model.name,
            }
        })
        .collect();
    Ok(Json(summaries))
}

#[debug_handler]
pub async fn get_model(
    State(state): State<Arc<TrackingState>>,
    Path(name): Path<String>,
) -> Result<Json<RegisteredModel>, ApiError> {
    let registry = state.registry.clone();
    let model = blocking(move || registry.get_registered_model(&name)).await?;
    Ok(Json(model))
}
