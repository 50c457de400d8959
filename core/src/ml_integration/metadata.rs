//! ML Model Metadata Types
//!
//! This module contains the metadata structures shared by training, tracking
//! and serving: classifier kinds, evaluation metrics, training configuration
//! and training outcomes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Name under which the best model of a training session is registered
pub const DEFAULT_REGISTERED_MODEL: &str = "salario-model";

/// Experiment that training runs are logged to when none is configured
pub const DEFAULT_EXPERIMENT: &str = "salario-experiment";

/// Label column of the salary dataset
pub const DEFAULT_LABEL_COLUMN: &str = "faixaSalarial";

/// Metadata stored alongside every persisted model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub id: Uuid,
    pub name: String,
    pub model_type: ModelType,
    pub run_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub training_data_size: usize,
    pub test_data_size: usize,
    pub metrics: ClassificationMetrics,
    /// Effective hyperparameters as plain numbers
    pub hyperparameters: BTreeMap<String, f64>,
    pub description: String,
}

/// Test-split metrics for a fitted classifier
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Macro one-vs-rest AUC, absent when no class has both positives and negatives
    pub roc_auc: Option<f64>,
    pub log_loss: f64,
    pub training_time_ms: u64,
}

impl ClassificationMetrics {
    /// Metric names in the order they are logged
    pub const NAMES: [&'static str; 6] = [
        "accuracy",
        "f1",
        "precision",
        "recall",
        "roc_auc",
        "log_loss",
    ];

    /// Look up a metric by its logged name
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "accuracy" => Some(self.accuracy),
            "f1" | "f1_score" => Some(self.f1_score),
            "precision" => Some(self.precision),
            "recall" => Some(self.recall),
            "roc_auc" => self.roc_auc,
            "log_loss" => Some(self.log_loss),
            _ => None,
        }
    }

    /// Metrics as (name, value) pairs, skipping undefined values
    pub fn as_pairs(&self) -> Vec<(&'static str, f64)> {
        Self::NAMES
            .iter()
            .filter_map(|name| self.get(name).map(|value| (*name, value)))
            .collect()
    }

    /// Whether `name` is a logged metric or an accepted alias
    pub fn is_known(name: &str) -> bool {
        Self::NAMES.contains(&name) || name == "f1_score"
    }

    /// Whether a larger value of `metric` means a better model
    pub fn higher_is_better(metric: &str) -> bool {
        metric != "log_loss"
    }
}

/// Classifier kinds supported by the trainer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    LogisticRegression,
    DecisionTree,
    NaiveBayes,
}

impl ModelType {
    pub const ALL: [ModelType; 3] = [
        ModelType::LogisticRegression,
        ModelType::DecisionTree,
        ModelType::NaiveBayes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::LogisticRegression => "logistic_regression",
            ModelType::DecisionTree => "decision_tree",
            ModelType::NaiveBayes => "naive_bayes",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::LogisticRegression => "LogisticRegression",
            ModelType::DecisionTree => "DecisionTree",
            ModelType::NaiveBayes => "NaiveBayes",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "logistic_regression" | "logistic" | "logreg" => Ok(ModelType::LogisticRegression),
            "decision_tree" | "tree" => Ok(ModelType::DecisionTree),
            "naive_bayes" | "gaussian_nb" | "nb" => Ok(ModelType::NaiveBayes),
            other => Err(anyhow::anyhow!("Unsupported model type: {}", other)),
        }
    }
}

/// Training configuration for a training session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub model_types: Vec<ModelType>,
    pub test_size: f64,
    pub random_seed: u64,
    pub scoring_metric: String,
    pub label_column: String,
    pub experiment_name: String,
    pub registered_model_name: String,
    /// Hyperparameters keyed by model type name (`decision_tree`, ...)
    pub hyperparameters: HashMap<String, HashMap<String, serde_json::Value>>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_types: ModelType::ALL.to_vec(),
            test_size: 0.2,
            random_seed: 42,
            scoring_metric: "f1".to_string(),
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            experiment_name: DEFAULT_EXPERIMENT.to_string(),
            registered_model_name: DEFAULT_REGISTERED_MODEL.to_string(),
            hyperparameters: HashMap::new(),
        }
    }
}

impl TrainingConfig {
    /// Hyperparameters configured for one model type (empty when none)
    pub fn hyperparameters_for(&self, model_type: ModelType) -> HashMap<String, serde_json::Value> {
        self.hyperparameters
            .get(model_type.as_str())
            .cloned()
            .unwrap_or_default()
    }
}

/// Outcome of a single classifier run inside a training session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub model_type: ModelType,
    pub metrics: Option<ClassificationMetrics>,
    pub error: Option<String>,
}

/// Result of a whole training session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub experiment_id: String,
    pub runs: Vec<RunOutcome>,
    pub best_run_id: String,
    pub best_model_type: ModelType,
    pub registered_model: String,
    pub registered_version: u32,
}

impl TrainingSummary {
    /// Outcome of the registered run
    pub fn best_run(&self) -> Option<&RunOutcome> {
        self.runs.iter().find(|run| run.run_id == self.best_run_id)
    }
}
