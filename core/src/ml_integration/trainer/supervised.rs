//! Supervised Learning Training Methods

use crate::ml_integration::metadata::ModelType;
use crate::ml_integration::models::SalaryClassifier;
use anyhow::Result;
use linfa::prelude::*;
use linfa_bayes::GaussianNb;
use linfa_logistic::MultiLogisticRegression;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

type Hyperparameters = HashMap<String, serde_json::Value>;

/// Hyperparameter values a classifier was actually fitted with
pub type EffectiveParams = BTreeMap<String, f64>;

fn validate(features: &Array2<f64>, targets: &Array1<usize>) -> Result<()> {
    if features.nrows() != targets.len() {
        return Err(anyhow::anyhow!(
            "Features and targets must have same number of samples: {} vs {}",
            features.nrows(),
            targets.len()
        ));
    }

    if features.is_empty() || targets.is_empty() {
        return Err(anyhow::anyhow!("Features and targets cannot be empty"));
    }

    Ok(())
}

/// Fit the requested classifier, returning it with the effective hyperparameters
pub fn train_classifier(
    model_type: ModelType,
    features: &Array2<f64>,
    targets: &Array1<usize>,
    hyperparameters: &Hyperparameters,
) -> Result<(SalaryClassifier, EffectiveParams)> {
    match model_type {
        ModelType::LogisticRegression => {
            train_logistic_regression(features, targets, hyperparameters)
        }
        ModelType::DecisionTree => train_decision_tree(features, targets, hyperparameters),
        ModelType::NaiveBayes => train_naive_bayes(features, targets, hyperparameters),
    }
}

pub fn train_logistic_regression(
    features: &Array2<f64>,
    targets: &Array1<usize>,
    hyperparameters: &Hyperparameters,
) -> Result<(SalaryClassifier, EffectiveParams)> {
    info!(
        "Starting Logistic Regression training with {} samples and {} features",
        features.nrows(),
        features.ncols()
    );

    // Extract hyperparameters with defaults
    let max_iterations = hyperparameters
        .get("max_iterations")
        .and_then(|v| v.as_u64())
        .unwrap_or(200);

    let alpha = hyperparameters
        .get("alpha")
        .and_then(|v| v.as_f64())
        .unwrap_or(1.0);

    validate(features, targets)?;

    let dataset = Dataset::new(features.clone(), targets.clone());

    let model = MultiLogisticRegression::default()
        .max_iterations(max_iterations)
        .alpha(alpha)
        .fit(&dataset)
        .map_err(|e| anyhow::anyhow!("Logistic regression training failed: {}", e))?;

    info!("Logistic regression training completed successfully");

    let effective = BTreeMap::from([
        ("max_iterations".to_string(), max_iterations as f64),
        ("alpha".to_string(), alpha),
    ]);
    Ok((SalaryClassifier::LogisticRegression(model), effective))
}

pub fn train_decision_tree(
    features: &Array2<f64>,
    targets: &Array1<usize>,
    hyperparameters: &Hyperparameters,
) -> Result<(SalaryClassifier, EffectiveParams)> {
    info!(
        "Starting Decision Tree training with {} samples and {} features",
        features.nrows(),
        features.ncols()
    );

    let max_depth = hyperparameters
        .get("max_depth")
        .and_then(|v| v.as_u64())
        .unwrap_or(8) as usize;

    let min_samples_split = hyperparameters
        .get("min_samples_split")
        .and_then(|v| v.as_u64())
        .unwrap_or(2) as usize;

    let min_samples_leaf = hyperparameters
        .get("min_samples_leaf")
        .and_then(|v| v.as_u64())
        .unwrap_or(1) as usize;

    validate(features, targets)?;

    if features.nrows() < min_samples_split {
        return Err(anyhow::anyhow!("Decision tree requires more samples than min_samples_split: {} samples, {} min_samples_split", features.nrows(), min_samples_split));
    }

    let dataset = Dataset::new(features.clone(), targets.clone());

    // unit sample weights, so weight thresholds are sample counts
    let decision_tree = DecisionTree::params()
        .max_depth(Some(max_depth))
        .min_weight_split(min_samples_split as f32)
        .min_weight_leaf(min_samples_leaf as f32)
        .fit(&dataset)
        .map_err(|e| anyhow::anyhow!("Decision tree training failed: {}", e))?;

    info!("Decision tree training completed successfully");

    let effective = BTreeMap::from([
        ("max_depth".to_string(), max_depth as f64),
        ("min_samples_split".to_string(), min_samples_split as f64),
        ("min_samples_leaf".to_string(), min_samples_leaf as f64),
    ]);
    Ok((SalaryClassifier::DecisionTree(decision_tree), effective))
}

pub fn train_naive_bayes(
    features: &Array2<f64>,
    targets: &Array1<usize>,
    hyperparameters: &Hyperparameters,
) -> Result<(SalaryClassifier, EffectiveParams)> {
    info!(
        "Starting Naive Bayes training with {} samples and {} features",
        features.nrows(),
        features.ncols()
    );

    let var_smoothing = hyperparameters
        .get("var_smoothing")
        .and_then(|v| v.as_f64())
        .unwrap_or(1e-9);

    validate(features, targets)?;

    let dataset = Dataset::new(features.clone(), targets.clone());

    let model = GaussianNb::params()
        .var_smoothing(var_smoothing)
        .fit(&dataset)
        .map_err(|e| anyhow::anyhow!("Naive Bayes training failed: {}", e))?;

    info!("Naive Bayes training completed successfully");

    let effective = BTreeMap::from([("var_smoothing".to_string(), var_smoothing)]);
    Ok((SalaryClassifier::NaiveBayes(model), effective))
}
