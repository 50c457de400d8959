//! Trained model implementations
//!
//! [`SalaryClassifier`] wraps the fitted linfa estimators; [`SalaryModel`] is
//! the persisted artifact bundling a classifier with its encoder, class labels
//! and metadata.

use anyhow::{Context, Result};
use linfa::prelude::*;
use linfa_bayes::GaussianNb;
use linfa_logistic::MultiFittedLogisticRegression;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ml_integration::dataset::SalaryRecord;
use crate::ml_integration::encoder::FeatureEncoder;
use crate::ml_integration::metadata::{ModelMetadata, ModelType};
use crate::ml_integration::metrics;

/// File name of the model artifact inside a run
pub const MODEL_ARTIFACT: &str = "model.bin";

/// A fitted classifier over class indices
#[derive(Serialize, Deserialize)]
pub enum SalaryClassifier {
    LogisticRegression(MultiFittedLogisticRegression<f64, usize>),
    DecisionTree(DecisionTree<f64, usize>),
    NaiveBayes(GaussianNb<f64, usize>),
}

impl fmt::Debug for SalaryClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SalaryClassifier")
            .field(&self.model_type())
            .finish()
    }
}

impl SalaryClassifier {
    pub fn model_type(&self) -> ModelType {
        match self {
            SalaryClassifier::LogisticRegression(_) => ModelType::LogisticRegression,
            SalaryClassifier::DecisionTree(_) => ModelType::DecisionTree,
            SalaryClassifier::NaiveBayes(_) => ModelType::NaiveBayes,
        }
    }

    /// Predicted class index per row
    pub fn predict_indices(&self, features: &Array2<f64>) -> Array1<usize> {
        match self {
            SalaryClassifier::LogisticRegression(model) => model.predict(features),
            SalaryClassifier::DecisionTree(model) => model.predict(features),
            SalaryClassifier::NaiveBayes(model) => model.predict(features),
        }
    }

    /// Class probabilities, one column per class index
    pub fn predict_proba(&self, features: &Array2<f64>, n_classes: usize) -> Array2<f64> {
        match self {
            SalaryClassifier::LogisticRegression(model) => {
                let raw = model.predict_probabilities(features);
                let mut probabilities = Array2::<f64>::zeros((features.nrows(), n_classes));
                for (col, &class) in model.classes().iter().enumerate() {
                    if class < n_classes {
                        probabilities.column_mut(class).assign(&raw.column(col));
                    }
                }
                probabilities
            }
            _ => metrics::one_hot(self.predict_indices(features).view(), n_classes),
        }
    }
}

/// Prediction for one record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelPrediction {
    pub label: String,
    pub probabilities: Vec<(String, f64)>,
}

/// Persisted model artifact
#[derive(Debug, Serialize, Deserialize)]
pub struct SalaryModel {
    pub metadata: ModelMetadata,
    pub encoder: FeatureEncoder,
    pub classes: Vec<String>,
    pub classifier: SalaryClassifier,
}

impl SalaryModel {
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Encoded feature names the classifier was fitted on
    pub fn feature_names(&self) -> Vec<String> {
        self.encoder.feature_names()
    }

    pub fn predict(&self, records: &[SalaryRecord]) -> Result<Vec<LabelPrediction>> {
        let features = self.encoder.transform(records);
        let indices = self.classifier.predict_indices(&features);
        let probabilities = self.classifier.predict_proba(&features, self.n_classes());

        indices
            .iter()
            .enumerate()
            .map(|(row, &class)| {
                let label = self
                    .classes
                    .get(class)
                    .cloned()
                    .with_context(|| format!("Classifier produced unknown class index {}", class))?;
                let probabilities = self
                    .classes
                    .iter()
                    .cloned()
                    .zip(probabilities.row(row).iter().copied())
                    .collect();
                Ok(LabelPrediction {
                    label,
                    probabilities,
                })
            })
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("Failed to serialize model artifact")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).context("Failed to decode model artifact")
    }
}
