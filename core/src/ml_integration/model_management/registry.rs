//! Model Registry
//!
//! Central registry for named models and their versions. Each version points
//! at a model artifact logged by a tracking run.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::ml_integration::metadata::{ClassificationMetrics, ModelType};
use crate::ml_integration::model_management::tracking::{
    read_json, validate_name, write_json, Result, TrackingError, TrackingStore,
};
use crate::ml_integration::models::SalaryModel;

const MODELS_DIR: &str = "models";
const REGISTERED_META: &str = "registered.json";

/// Model version status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ModelStatus {
    /// Version is ready for serving
    Ready,
    /// Version was superseded and should no longer be served
    Archived,
}

/// One registered version of a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersion {
    pub version: u32,
    pub run_id: String,
    /// Artifact name inside the run
    pub artifact: String,
    pub model_type: Option<ModelType>,
    pub metrics: Option<ClassificationMetrics>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub status: ModelStatus,
}

/// A named model with all of its versions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub name: String,
    pub description: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub versions: Vec<ModelVersion>,
}

impl RegisteredModel {
    /// Highest version number that is still servable
    pub fn latest_version(&self) -> Option<&ModelVersion> {
        self.versions
            .iter()
            .filter(|v| v.status == ModelStatus::Ready)
            .max_by_key(|v| v.version)
    }
}

/// Extra information attached to a new version
#[derive(Debug, Clone, Default)]
pub struct VersionDetails {
    pub model_type: Option<ModelType>,
    pub metrics: Option<ClassificationMetrics>,
    pub description: Option<String>,
}

/// Model Registry
///
/// File-backed registry living next to the runs of a [`TrackingStore`].
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    store: TrackingStore,
}

impl ModelRegistry {
    /// Create a registry over an existing tracking store
    pub fn new(store: TrackingStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TrackingStore {
        &self.store
    }

    fn model_file(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self
            .store
            .root()
            .join(MODELS_DIR)
            .join(name)
            .join(REGISTERED_META))
    }

    /// Register the artifact of `run_id` as the next version of `name`
    pub fn register_model(
        &self,
        name: &str,
        run_id: &str,
        artifact: &str,
        details: VersionDetails,
    ) -> Result<ModelVersion> {
        debug!("Registering {}/{} as model {}", run_id, artifact, name);

        // the artifact must exist before it can be served
        self.store.artifact_path(run_id, artifact)?;

        let path = self.model_file(name)?;
        let now = chrono::Utc::now();
        let mut model = if path.is_file() {
            read_json::<RegisteredModel>(&path)?
        } else {
            let dir = path.parent().map(PathBuf::from).unwrap_or_default();
            fs::create_dir_all(&dir).map_err(|source| TrackingError::Io { path: dir, source })?;
            RegisteredModel {
                name: name.to_string(),
                description: String::new(),
                created_at: now,
                updated_at: now,
                versions: Vec::new(),
            }
        };

        let next = model.versions.iter().map(|v| v.version).max().unwrap_or(0) + 1;
        let version = ModelVersion {
            version: next,
            run_id: run_id.to_string(),
            artifact: artifact.to_string(),
            model_type: details.model_type,
            metrics: details.metrics,
            created_at: now,
            status: ModelStatus::Ready,
        };
        model.versions.push(version.clone());
        model.updated_at = now;
        if let Some(description) = details.description {
            model.description = description;
        }
        write_json(&path, &model)?;

        info!("Registered model '{}' version {}", name, next);
        Ok(version)
    }

    pub fn get_registered_model(&self, name: &str) -> Result<RegisteredModel> {
        let path = self.model_file(name)?;
        if !path.is_file() {
            return Err(TrackingError::ModelNotFound(name.to_string()));
        }
        read_json(&path)
    }

    /// All registered models, sorted by name
    pub fn list_registered_models(&self) -> Result<Vec<RegisteredModel>> {
        let dir = self.store.root().join(MODELS_DIR);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut models = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|source| TrackingError::Io {
            path: dir.clone(),
            source,
        })? {
            let entry = entry.map_err(|source| TrackingError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path().join(REGISTERED_META);
            if path.is_file() {
                models.push(read_json::<RegisteredModel>(&path)?);
            }
        }
        models.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(models)
    }

    pub fn latest_version(&self, name: &str) -> Result<ModelVersion> {
        self.get_registered_model(name)?
            .latest_version()
            .cloned()
            .ok_or_else(|| TrackingError::ModelNotFound(name.to_string()))
    }

    pub fn get_version(&self, name: &str, version: u32) -> Result<ModelVersion> {
        self.get_registered_model(name)?
            .versions
            .into_iter()
            .find(|v| v.version == version)
            .ok_or_else(|| TrackingError::VersionNotFound {
                name: name.to_string(),
                version,
            })
    }

    /// Mark a version as no longer servable
    pub fn archive_version(&self, name: &str, version: u32) -> Result<ModelVersion> {
        let path = self.model_file(name)?;
        let mut model = self.get_registered_model(name)?;
        let entry = model
            .versions
            .iter_mut()
            .find(|v| v.version == version)
            .ok_or_else(|| TrackingError::VersionNotFound {
                name: name.to_string(),
                version,
            })?;
        entry.status = ModelStatus::Archived;
        let archived = entry.clone();
        model.updated_at = chrono::Utc::now();
        write_json(&path, &model)?;

        info!("Archived model '{}' version {}", name, version);
        Ok(archived)
    }

    /// Decode the artifact of a version (`None` = latest)
    pub fn load_model(
        &self,
        name: &str,
        version: Option<u32>,
    ) -> anyhow::Result<(SalaryModel, ModelVersion)> {
        let version = match version {
            Some(v) => self.get_version(name, v)?,
            None => self.latest_version(name)?,
        };
        let bytes = self.store.load_artifact(&version.run_id, &version.artifact)?;
        let model = SalaryModel::from_bytes(&bytes).with_context(|| {
            format!("Failed to load model '{}' version {}", name, version.version)
        })?;

        info!("Loaded model '{}' version {}", name, version.version);
        Ok((model, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with_run(dir: &TempDir) -> (TrackingStore, String) {
        let store = TrackingStore::open(dir.path()).unwrap();
        let experiment = store.create_experiment("salario").unwrap();
        let mut run = store.start_run(&experiment.experiment_id, "run").unwrap();
        run.log_artifact("model.bin", b"bytes").unwrap();
        let record = run.end(crate::ml_integration::model_management::RunStatus::Finished).unwrap();
        (store, record.run_id)
    }

    #[test]
    fn test_versions_increase_by_one() {
        let dir = TempDir::new().unwrap();
        let (store, run_id) = store_with_run(&dir);
        let registry = ModelRegistry::new(store);

        for expected in 1..=3 {
            let version = registry
                .register_model("salario-model", &run_id, "model.bin", VersionDetails::default())
                .unwrap();
            assert_eq!(version.version, expected);
        }
        assert_eq!(registry.latest_version("salario-model").unwrap().version, 3);
        assert_eq!(registry.list_registered_models().unwrap().len(), 1);

        registry.archive_version("salario-model", 3).unwrap();
        assert_eq!(registry.latest_version("salario-model").unwrap().version, 2);
    }

    #[test]
    fn test_missing_model_and_artifact() {
        let dir = TempDir::new().unwrap();
        let (store, run_id) = store_with_run(&dir);
        let registry = ModelRegistry::new(store);

        assert!(matches!(
            registry.latest_version("salario-model"),
            Err(TrackingError::ModelNotFound(_))
        ));
        assert!(matches!(
            registry.register_model("salario-model", &run_id, "other.bin", VersionDetails::default()),
            Err(TrackingError::ArtifactNotFound { .. })
        ));
        assert!(registry.get_version("salario-model", 1).is_err());
    }

    #[test]
    fn test_garbage_artifact_fails_to_decode() {
        let dir = TempDir::new().unwrap();
        let (store, run_id) = store_with_run(&dir);
        let registry = ModelRegistry::new(store);
        registry
            .register_model("salario-model", &run_id, "model.bin", VersionDetails::default())
            .unwrap();
        assert!(registry.load_model("salario-model", None).is_err());
    }
}
