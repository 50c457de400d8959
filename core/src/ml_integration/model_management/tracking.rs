//! Experiment Tracking Store
//!
//! File-backed record of experiments and runs: parameters, metrics, tags and
//! artifacts of every training run, laid out as
//!
//! ```text
//! <root>/<experiment_id>/meta.json
//! <root>/<experiment_id>/<run_id>/run.json
//! <root>/<experiment_id>/<run_id>/artifacts/<name>
//! ```

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

const EXPERIMENT_META: &str = "meta.json";
const RUN_META: &str = "run.json";
const ARTIFACTS_DIR: &str = "artifacts";

/// Tracking store errors
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt metadata at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Experiment already exists: '{0}'")]
    ExperimentExists(String),

    #[error("Experiment not found: '{0}'")]
    ExperimentNotFound(String),

    #[error("Run not found: '{0}'")]
    RunNotFound(String),

    #[error("Artifact '{name}' not found for run '{run_id}'")]
    ArtifactNotFound { run_id: String, name: String },

    #[error("Registered model not found: '{0}'")]
    ModelNotFound(String),

    #[error("Version {version} of registered model '{name}' not found")]
    VersionNotFound { name: String, version: u32 },

    #[error("Invalid name: '{0}'")]
    InvalidName(String),
}

pub type Result<T> = std::result::Result<T, TrackingError>;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> TrackingError + '_ {
    move |source| TrackingError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(io_err(path))?;
    serde_json::from_str(&content).map_err(|source| TrackingError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write through a sibling temp file so readers never see a partial document
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value).map_err(|source| TrackingError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(io_err(path))
}

/// Names become directory or file names; keep them to one path component
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
    {
        return Err(TrackingError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// A named group of runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Run lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// One logged value of a metric
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricPoint {
    pub value: f64,
    pub step: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Persisted state of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment_id: String,
    pub run_name: String,
    pub status: RunStatus,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub params: BTreeMap<String, String>,
    /// Full history per metric, oldest first
    pub metrics: BTreeMap<String, Vec<MetricPoint>>,
    pub tags: BTreeMap<String, String>,
    pub artifacts: Vec<String>,
}

impl RunRecord {
    /// Latest value of a metric
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics
            .get(key)
            .and_then(|history| history.last())
            .map(|point| point.value)
    }

    pub fn latest_metrics(&self) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .filter_map(|(key, history)| history.last().map(|p| (key.clone(), p.value)))
            .collect()
    }
}

/// A run that is still accepting params, metrics and artifacts
///
/// Every mutation is persisted immediately; [`ActiveRun::end`] consumes the
/// handle so nothing can be logged after the run is closed.
#[derive(Debug)]
pub struct ActiveRun {
    record: RunRecord,
    dir: PathBuf,
}

impl ActiveRun {
    pub fn run_id(&self) -> &str {
        &self.record.run_id
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    fn persist(&self) -> Result<()> {
        write_json(&self.dir.join(RUN_META), &self.record)
    }

    pub fn log_param(&mut self, key: &str, value: impl ToString) -> Result<()> {
        self.record.params.insert(key.to_string(), value.to_string());
        self.persist()
    }

    pub fn log_params<K: AsRef<str>, V: ToString>(
        &mut self,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> Result<()> {
        for (key, value) in params {
            self.record
                .params
                .insert(key.as_ref().to_string(), value.to_string());
        }
        self.persist()
    }

    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        let history = self.record.metrics.entry(key.to_string()).or_default();
        history.push(MetricPoint {
            value,
            step: history.len() as u64,
            timestamp: chrono::Utc::now(),
        });
        self.persist()
    }

    pub fn set_tag(&mut self, key: &str, value: impl ToString) -> Result<()> {
        self.record.tags.insert(key.to_string(), value.to_string());
        self.persist()
    }

    /// Store raw bytes as an artifact of this run
    pub fn log_artifact(&mut self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        validate_name(name)?;
        let dir = self.dir.join(ARTIFACTS_DIR);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let path = dir.join(name);
        fs::write(&path, bytes).map_err(io_err(&path))?;

        if !self.record.artifacts.iter().any(|a| a == name) {
            self.record.artifacts.push(name.to_string());
        }
        self.persist()?;
        debug!("Logged artifact {} ({} bytes) for run {}", name, bytes.len(), self.record.run_id);
        Ok(path)
    }

    /// Close the run with a terminal status
    pub fn end(mut self, status: RunStatus) -> Result<RunRecord> {
        self.record.status = status;
        self.record.end_time = Some(chrono::Utc::now());
        self.persist()?;
        info!("Run {} ended with status {:?}", self.record.run_id, status);
        Ok(self.record)
    }
}

/// File-backed experiment tracking store
#[derive(Debug, Clone)]
pub struct TrackingStore {
    root: PathBuf,
}

impl TrackingStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(io_err(&root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn experiment_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_err(&self.root))? {
            let path = entry.map_err(io_err(&self.root))?.path();
            if path.join(EXPERIMENT_META).is_file() {
                dirs.push(path);
            }
        }
        Ok(dirs)
    }

    pub fn list_experiments(&self) -> Result<Vec<Experiment>> {
        let mut experiments = self
            .experiment_dirs()?
            .iter()
            .map(|dir| read_json::<Experiment>(&dir.join(EXPERIMENT_META)))
            .collect::<Result<Vec<_>>>()?;
        experiments.sort_by_key(|e| e.experiment_id.parse::<u64>().unwrap_or(u64::MAX));
        Ok(experiments)
    }

    pub fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        Ok(self
            .list_experiments()?
            .into_iter()
            .find(|experiment| experiment.name == name))
    }

    /// Directory of an existing experiment
    fn experiment_dir(&self, experiment_id: &str) -> Result<PathBuf> {
        let not_found = || TrackingError::ExperimentNotFound(experiment_id.to_string());
        validate_name(experiment_id).map_err(|_| not_found())?;
        let dir = self.root.join(experiment_id);
        if !dir.join(EXPERIMENT_META).is_file() {
            return Err(not_found());
        }
        Ok(dir)
    }

    pub fn get_experiment(&self, experiment_id: &str) -> Result<Experiment> {
        read_json(&self.experiment_dir(experiment_id)?.join(EXPERIMENT_META))
    }

    /// Create a new experiment; ids are sequential integers starting at 1
    pub fn create_experiment(&self, name: &str) -> Result<Experiment> {
        if name.trim().is_empty() {
            return Err(TrackingError::InvalidName(name.to_string()));
        }
        let existing = self.list_experiments()?;
        if existing.iter().any(|e| e.name == name) {
            return Err(TrackingError::ExperimentExists(name.to_string()));
        }

        let next_id = existing
            .iter()
            .filter_map(|e| e.experiment_id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;

        let experiment = Experiment {
            experiment_id: next_id.to_string(),
            name: name.to_string(),
            created_at: chrono::Utc::now(),
        };
        let dir = self.root.join(&experiment.experiment_id);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        write_json(&dir.join(EXPERIMENT_META), &experiment)?;

        info!("Created experiment '{}' ({})", name, experiment.experiment_id);
        Ok(experiment)
    }

    pub fn get_or_create_experiment(&self, name: &str) -> Result<Experiment> {
        match self.get_experiment_by_name(name)? {
            Some(experiment) => Ok(experiment),
            None => self.create_experiment(name),
        }
    }

    pub fn start_run(&self, experiment_id: &str, run_name: &str) -> Result<ActiveRun> {
        let run_id = Uuid::new_v4().simple().to_string();
        let dir = self.experiment_dir(experiment_id)?.join(&run_id);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let run = ActiveRun {
            record: RunRecord {
                run_id: run_id.clone(),
                experiment_id: experiment_id.to_string(),
                run_name: run_name.to_string(),
                status: RunStatus::Running,
                start_time: chrono::Utc::now(),
                end_time: None,
                params: BTreeMap::new(),
                metrics: BTreeMap::new(),
                tags: BTreeMap::new(),
                artifacts: Vec::new(),
            },
            dir,
        };
        run.persist()?;

        info!("Started run {} ({}) in experiment {}", run_id, run_name, experiment_id);
        Ok(run)
    }

    fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        validate_name(run_id).map_err(|_| TrackingError::RunNotFound(run_id.to_string()))?;
        self.experiment_dirs()?
            .into_iter()
            .map(|dir| dir.join(run_id))
            .find(|dir| dir.join(RUN_META).is_file())
            .ok_or_else(|| TrackingError::RunNotFound(run_id.to_string()))
    }

    pub fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        read_json(&self.run_dir(run_id)?.join(RUN_META))
    }

    /// Runs of one experiment, newest first
    pub fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        let dir = self.experiment_dir(experiment_id)?;

        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir).map_err(io_err(&dir))? {
            let path = entry.map_err(io_err(&dir))?.path().join(RUN_META);
            if !path.is_file() {
                continue;
            }
            match read_json::<RunRecord>(&path) {
                Ok(run) => runs.push(run),
                Err(e) => warn!("Skipping unreadable run: {}", e),
            }
        }
        runs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(runs)
    }

    pub fn artifact_path(&self, run_id: &str, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        let path = self.run_dir(run_id)?.join(ARTIFACTS_DIR).join(name);
        if !path.is_file() {
            return Err(TrackingError::ArtifactNotFound {
                run_id: run_id.to_string(),
                name: name.to_string(),
            });
        }
        Ok(path)
    }

    pub fn load_artifact(&self, run_id: &str, name: &str) -> Result<Vec<u8>> {
        let path = self.artifact_path(run_id, name)?;
        fs::read(&path).map_err(io_err(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_experiments_get_sequential_ids() {
        let dir = TempDir::new().unwrap();
        let store = TrackingStore::open(dir.path()).unwrap();

        let first = store.create_experiment("salario").unwrap();
        let second = store.create_experiment("outro").unwrap();
        assert_eq!(first.experiment_id, "1");
        assert_eq!(second.experiment_id, "2");
        assert!(matches!(
            store.create_experiment("salario"),
            Err(TrackingError::ExperimentExists(_))
        ));

        let again = store.get_or_create_experiment("salario").unwrap();
        assert_eq!(again, first);
        assert_eq!(store.list_experiments().unwrap().len(), 2);
    }

    #[test]
    fn test_run_lifecycle_is_persisted() {
        let dir = TempDir::new().unwrap();
        let store = TrackingStore::open(dir.path()).unwrap();
        let experiment = store.create_experiment("salario").unwrap();

        let mut run = store.start_run(&experiment.experiment_id, "tree").unwrap();
        let run_id = run.run_id().to_string();
        run.log_param("max_depth", 8).unwrap();
        run.log_metric("accuracy", 0.5).unwrap();
        run.log_metric("accuracy", 0.75).unwrap();
        run.log_artifact("model.bin", b"weights").unwrap();

        // visible on disk before the run ends
        let running = store.get_run(&run_id).unwrap();
        assert_eq!(running.status, RunStatus::Running);
        assert_eq!(running.params["max_depth"], "8");

        let finished = run.end(RunStatus::Finished).unwrap();
        assert!(finished.end_time.is_some());

        let loaded = store.get_run(&run_id).unwrap();
        assert_eq!(loaded.status, RunStatus::Finished);
        assert_eq!(loaded.metric("accuracy"), Some(0.75));
        assert_eq!(loaded.metrics["accuracy"].len(), 2);
        assert_eq!(store.load_artifact(&run_id, "model.bin").unwrap(), b"weights");
        assert_eq!(store.list_runs(&experiment.experiment_id).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_lookups_fail() {
        let dir = TempDir::new().unwrap();
        let store = TrackingStore::open(dir.path()).unwrap();
        assert!(matches!(store.get_run("missing"), Err(TrackingError::RunNotFound(_))));
        assert!(matches!(
            store.start_run("42", "x"),
            Err(TrackingError::ExperimentNotFound(_))
        ));
        assert!(matches!(store.get_run("../etc"), Err(TrackingError::RunNotFound(_))));
    }

    #[test]
    fn test_experiment_ids_stay_inside_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("mlruns");
        let store = TrackingStore::open(&root).unwrap();

        // a sibling experiment outside the tracking root
        let outside = dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        let experiment = store.create_experiment("salario").unwrap();
        fs::copy(
            root.join(&experiment.experiment_id).join(EXPERIMENT_META),
            outside.join(EXPERIMENT_META),
        )
        .unwrap();

        for id in ["../outside", "..", "/etc", "a/b"] {
            assert!(
                matches!(store.get_experiment(id), Err(TrackingError::ExperimentNotFound(_))),
                "{} resolved",
                id
            );
            assert!(matches!(store.list_runs(id), Err(TrackingError::ExperimentNotFound(_))));
            assert!(matches!(
                store.start_run(id, "x"),
                Err(TrackingError::ExperimentNotFound(_))
            ));
        }
        assert!(store.list_runs(&experiment.experiment_id).unwrap().is_empty());
    }
}
