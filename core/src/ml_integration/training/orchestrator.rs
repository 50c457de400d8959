//! Training orchestration for salary-band classifiers

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ml_integration::dataset::{self, LabeledDataset};
use crate::ml_integration::encoder::FeatureEncoder;
use crate::ml_integration::metadata::{
    ClassificationMetrics, ModelMetadata, ModelType, RunOutcome, TrainingConfig, TrainingSummary,
};
use crate::ml_integration::metrics;
use crate::ml_integration::model_management::{
    ActiveRun, ModelRegistry, RunStatus, VersionDetails,
};
use crate::ml_integration::models::{SalaryModel, MODEL_ARTIFACT};
use crate::ml_integration::trainer;

/// Encoded train/test matrices shared by every classifier of a session
struct PreparedData {
    encoder: FeatureEncoder,
    classes: Vec<String>,
    x_train: Array2<f64>,
    y_train: Array1<usize>,
    x_test: Array2<f64>,
    y_test: Array1<usize>,
}

impl PreparedData {
    fn prepare(dataset: &LabeledDataset, config: &TrainingConfig) -> Result<Self> {
        let classes = dataset.classes();
        let class_index: HashMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let (train_idx, test_idx) =
            dataset::train_test_split(dataset.len(), config.test_size, config.random_seed)?;
        let train = dataset.select(&train_idx);
        let test = dataset.select(&test_idx);

        // fitted on the training split only
        let encoder = FeatureEncoder::fit(&train.records)?;

        let targets = |part: &LabeledDataset| -> Array1<usize> {
            part.labels
                .iter()
                .map(|label| class_index[label.as_str()])
                .collect()
        };

        Ok(Self {
            x_train: encoder.transform(&train.records),
            y_train: targets(&train),
            x_test: encoder.transform(&test.records),
            y_test: targets(&test),
            encoder,
            classes,
        })
    }
}

/// Training orchestrator
///
/// Fits every configured classifier, logs each one as a tracking run, and
/// registers the best run as the next version of the served model.
pub struct TrainingOrchestrator {
    registry: ModelRegistry,
}

impl TrainingOrchestrator {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    /// Load the CSV at `data_path` and run a training session on it
    pub fn run(&self, data_path: &Path, config: &TrainingConfig) -> Result<TrainingSummary> {
        let dataset = dataset::load_dataset(data_path, &config.label_column)
            .with_context(|| format!("Failed to load dataset {}", data_path.display()))?;
        self.run_on(&dataset, config)
    }

    /// Run a training session on an in-memory dataset
    pub fn run_on(&self, dataset: &LabeledDataset, config: &TrainingConfig) -> Result<TrainingSummary> {
        if config.model_types.is_empty() {
            anyhow::bail!("No model types configured for training");
        }
        if !ClassificationMetrics::is_known(&config.scoring_metric) {
            anyhow::bail!("Unknown scoring metric '{}'", config.scoring_metric);
        }

        let data = PreparedData::prepare(dataset, config)?;
        info!(
            "Training on {} rows ({} train / {} test), {} features, {} classes",
            dataset.len(),
            data.y_train.len(),
            data.y_test.len(),
            data.encoder.n_features(),
            data.classes.len()
        );

        let store = self.registry.store();
        let experiment = store.get_or_create_experiment(&config.experiment_name)?;

        let mut runs = Vec::with_capacity(config.model_types.len());
        for &model_type in &config.model_types {
            let mut run = store.start_run(&experiment.experiment_id, model_type.display_name())?;
            let run_id = run.run_id().to_string();

            match self.fit_and_log(&mut run, model_type, &data, config) {
                Ok(metrics) => {
                    run.end(RunStatus::Finished)?;
                    runs.push(RunOutcome {
                        run_id,
                        model_type,
                        metrics: Some(metrics),
                        error: None,
                    });
                }
                Err(e) => {
                    warn!("Run {} ({}) failed: {:#}", run_id, model_type, e);
                    run.set_tag("error", format!("{:#}", e))?;
                    run.end(RunStatus::Failed)?;
                    runs.push(RunOutcome {
                        run_id,
                        model_type,
                        metrics: None,
                        error: Some(format!("{:#}", e)),
                    });
                }
            }
        }

        let best = select_best(&runs, &config.scoring_metric)
            .context("Every training run failed; nothing to register")?;
        let best_run_id = best.run_id.clone();
        let best_model_type = best.model_type;
        let best_metrics = best.metrics.clone();

        let version = self.registry.register_model(
            &config.registered_model_name,
            &best_run_id,
            MODEL_ARTIFACT,
            VersionDetails {
                model_type: Some(best_model_type),
                metrics: best_metrics,
                description: Some("Salary band classifier".to_string()),
            },
        )?;

        info!(
            "Best run {} ({}) registered as '{}' version {}",
            best_run_id, best_model_type, config.registered_model_name, version.version
        );

        Ok(TrainingSummary {
            experiment_id: experiment.experiment_id,
            best_run_id,
            best_model_type,
            registered_model: config.registered_model_name.clone(),
            registered_version: version.version,
            runs,
        })
    }

    fn fit_and_log(
        &self,
        run: &mut ActiveRun,
        model_type: ModelType,
        data: &PreparedData,
        config: &TrainingConfig,
    ) -> Result<ClassificationMetrics> {
        run.log_params([
            ("model_type", model_type.as_str().to_string()),
            ("test_size", config.test_size.to_string()),
            ("random_seed", config.random_seed.to_string()),
            ("train_rows", data.y_train.len().to_string()),
            ("test_rows", data.y_test.len().to_string()),
            ("n_features", data.encoder.n_features().to_string()),
            ("n_classes", data.classes.len().to_string()),
        ])?;

        let started = Instant::now();
        let (classifier, hyperparameters) = trainer::train_classifier(
            model_type,
            &data.x_train,
            &data.y_train,
            &config.hyperparameters_for(model_type),
        )?;
        let training_time_ms = started.elapsed().as_millis() as u64;
        run.log_params(hyperparameters.iter().map(|(k, v)| (k.as_str(), v.to_string())))?;

        let n_classes = data.classes.len();
        let predicted = classifier.predict_indices(&data.x_test);
        let probabilities = classifier.predict_proba(&data.x_test, n_classes);
        let mut metrics =
            metrics::evaluate(data.y_test.view(), predicted.view(), &probabilities, n_classes);
        metrics.training_time_ms = training_time_ms;

        for (name, value) in metrics.as_pairs() {
            run.log_metric(name, value)?;
        }
        run.log_metric("training_time_ms", training_time_ms as f64)?;

        let model = SalaryModel {
            metadata: ModelMetadata {
                id: Uuid::new_v4(),
                name: model_type.display_name().to_string(),
                model_type,
                run_id: run.run_id().to_string(),
                created_at: chrono::Utc::now(),
                training_data_size: data.y_train.len(),
                test_data_size: data.y_test.len(),
                metrics: metrics.clone(),
                hyperparameters,
                description: format!("{} salary band classifier", model_type.display_name()),
            },
            encoder: data.encoder.clone(),
            classes: data.classes.clone(),
            classifier,
        };
        run.log_artifact(MODEL_ARTIFACT, &model.to_bytes()?)?;
        run.log_artifact(
            "feature_names.json",
            &serde_json::to_vec_pretty(&model.feature_names())?,
        )?;
        run.log_artifact("classes.json", &serde_json::to_vec_pretty(&model.classes)?)?;

        info!(
            "{}: accuracy={:.4} f1={:.4} log_loss={:.4}",
            model_type, metrics.accuracy, metrics.f1_score, metrics.log_loss
        );
        Ok(metrics)
    }
}

/// Best finished run by `metric`; runs missing the metric rank last
pub fn select_best<'a>(runs: &'a [RunOutcome], metric: &str) -> Option<&'a RunOutcome> {
    let higher = ClassificationMetrics::higher_is_better(metric);
    let score = |run: &RunOutcome| -> Option<f64> {
        run.metrics.as_ref().and_then(|m| m.get(metric))
    };

    let mut best: Option<(&RunOutcome, Option<f64>)> = None;
    for run in runs.iter().filter(|r| r.metrics.is_some()) {
        let candidate = score(run);
        let better = match (&best, candidate) {
            (None, _) => true,
            (Some((_, None)), Some(_)) => true,
            (Some((_, Some(current))), Some(value)) => {
                if higher {
                    value > *current
                } else {
                    value < *current
                }
            }
            _ => false,
        };
        if better {
            best = Some((run, candidate));
        }
    }
    best.map(|(run, _)| run)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: &str, f1: Option<f64>, log_loss: f64) -> RunOutcome {
        RunOutcome {
            run_id: id.to_string(),
            model_type: ModelType::DecisionTree,
            metrics: f1.map(|f1_score| ClassificationMetrics {
                f1_score,
                log_loss,
                ..Default::default()
            }),
            error: None,
        }
    }

    #[test]
    fn test_select_best_respects_metric_direction() {
        let runs = vec![
            outcome("a", Some(0.6), 0.9),
            outcome("b", Some(0.8), 1.2),
            outcome("c", None, 0.0),
        ];
        assert_eq!(select_best(&runs, "f1").unwrap().run_id, "b");
        assert_eq!(select_best(&runs, "log_loss").unwrap().run_id, "a");
        // roc_auc is undefined everywhere; first finished run wins
        assert_eq!(select_best(&runs, "roc_auc").unwrap().run_id, "a");
        assert!(select_best(&[outcome("x", None, 0.0)], "f1").is_none());
    }
}
