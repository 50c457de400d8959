//! Salary prediction service
//!
//! Loads the latest registered model and the template data behind TTL caches,
//! validates incoming feature maps, and produces predictions enriched with
//! template statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::ml_integration::dataset::{self, SalaryRecord, TemplateData, FEATURE_COLUMNS};
use crate::ml_integration::metadata::{ClassificationMetrics, ModelType, DEFAULT_REGISTERED_MODEL};
use crate::ml_integration::model_management::{ModelRegistry, ModelVersion};
use crate::ml_integration::models::SalaryModel;

/// Upper bound of the age input
pub const MAX_AGE: i64 = 100;

/// Prediction errors
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("Missing feature '{0}'")]
    MissingFeature(String),

    #[error("Invalid value '{value}' for feature '{feature}': {reason}")]
    InvalidFeature {
        feature: String,
        value: String,
        reason: String,
    },

    #[error("Model '{name}' is not available: {reason}")]
    ModelUnavailable { name: String, reason: String },

    #[error("Template data is not available: {0}")]
    TemplateUnavailable(String),

    #[error("Prediction failed: {0}")]
    Failed(String),
}

impl PredictionError {
    /// Whether the caller sent bad input (as opposed to a server-side failure)
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            PredictionError::MissingFeature(_) | PredictionError::InvalidFeature { .. }
        )
    }
}

/// Feature name to value, as posted by the form or the JSON API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionRequest {
    pub features: BTreeMap<String, serde_json::Value>,
}

impl PredictionRequest {
    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self {
            features: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), serde_json::Value::String(v.into())))
                .collect(),
        }
    }

    /// Trimmed text of a feature; null and blank values count as absent
    pub fn text(&self, feature: &str) -> Option<String> {
        let text = match self.features.get(feature)? {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }
}

/// Probability assigned to one salary band
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BandProbability {
    pub label: String,
    pub probability: f64,
}

/// Prediction returned to the page and the JSON API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Label exactly as the model produced it
    pub raw_label: String,
    /// Label text after the last `"- "`
    pub salary_band: String,
    pub model_name: String,
    pub model_version: u32,
    pub model_type: ModelType,
    pub probabilities: Vec<BandProbability>,
    /// Template rows with the same seniority and state
    pub similar_profiles: usize,
    /// Percentage of template rows with the same job title, one decimal
    pub job_title_share: f64,
}

/// Summary of the served model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: u32,
    pub run_id: String,
    pub model_type: ModelType,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub metrics: ClassificationMetrics,
    pub classes: Vec<String>,
    pub n_features: usize,
}

/// A decoded model together with the registry version it came from
#[derive(Debug)]
pub struct LoadedModel {
    pub model: SalaryModel,
    pub version: ModelVersion,
}

/// Predictor settings
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    pub registered_model_name: String,
    pub template_path: PathBuf,
    pub model_ttl: Duration,
    pub template_ttl: Duration,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            registered_model_name: DEFAULT_REGISTERED_MODEL.to_string(),
            template_path: PathBuf::from("data/template.csv"),
            model_ttl: Duration::from_secs(24 * 60 * 60),
            template_ttl: Duration::from_secs(60 * 60),
        }
    }
}

struct Cached<T> {
    value: Arc<T>,
    loaded_at: Instant,
}

impl<T> Cached<T> {
    fn fresh(&self, ttl: Duration) -> Option<Arc<T>> {
        (self.loaded_at.elapsed() < ttl).then(|| self.value.clone())
    }
}

/// Text after the last `"- "` separator of a band label
pub fn clean_label(raw: &str) -> String {
    raw.rsplit("- ").next().unwrap_or(raw).to_string()
}

/// Turn a request into a record, rejecting missing or malformed features
pub fn validate_request(
    request: &PredictionRequest,
    min_age: i64,
) -> Result<SalaryRecord, PredictionError> {
    let mut values = BTreeMap::new();
    for feature in FEATURE_COLUMNS {
        let value = request
            .text(feature)
            .ok_or_else(|| PredictionError::MissingFeature(feature.to_string()))?;
        values.insert(feature, value);
    }

    let raw_age = &values["idade"];
    let idade = raw_age
        .parse::<f64>()
        .ok()
        .filter(|age| age.is_finite() && age.fract() == 0.0)
        .ok_or_else(|| PredictionError::InvalidFeature {
            feature: "idade".to_string(),
            value: raw_age.clone(),
            reason: "expected a whole number".to_string(),
        })?;
    if idade < min_age as f64 || idade > MAX_AGE as f64 {
        return Err(PredictionError::InvalidFeature {
            feature: "idade".to_string(),
            value: raw_age.clone(),
            reason: format!("must be between {} and {}", min_age, MAX_AGE),
        });
    }

    let take = |feature: &str| values.get(feature).cloned().unwrap_or_default();
    Ok(SalaryRecord {
        idade,
        genero: take("genero"),
        pcd: take("pcd"),
        uf_onde_mora: take("ufOndeMora"),
        cargo_atual: take("cargoAtual"),
        nivel: take("nivel"),
        tempo_experiencia_dados: take("tempoDeExperienciaDados"),
        tempo_experiencia_ti: take("tempoDeExperienciaEmTi"),
    })
}

/// Salary predictor
///
/// Cheap to share behind an `Arc`; caches are refreshed lazily once their
/// TTL expires.
pub struct SalaryPredictor {
    registry: ModelRegistry,
    config: PredictorConfig,
    model: RwLock<Option<Cached<LoadedModel>>>,
    template: RwLock<Option<Cached<TemplateData>>>,
}

impl SalaryPredictor {
    pub fn new(registry: ModelRegistry, config: PredictorConfig) -> Self {
        Self {
            registry,
            config,
            model: RwLock::new(None),
            template: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Latest version of the registered model
    pub async fn load_model(&self) -> Result<Arc<LoadedModel>, PredictionError> {
        if let Some(model) = self
            .model
            .read()
            .await
            .as_ref()
            .and_then(|c| c.fresh(self.config.model_ttl))
        {
            return Ok(model);
        }

        let mut slot = self.model.write().await;
        // another request may have refreshed it while we waited
        if let Some(model) = slot.as_ref().and_then(|c| c.fresh(self.config.model_ttl)) {
            return Ok(model);
        }

        let name = self.config.registered_model_name.clone();
        let registry = self.registry.clone();
        let loaded = tokio::task::spawn_blocking(move || registry.load_model(&name, None))
            .await
            .map_err(|e| PredictionError::Failed(e.to_string()))?
            .map_err(|e| {
                error!("Failed to load model: {:#}", e);
                PredictionError::ModelUnavailable {
                    name: self.config.registered_model_name.clone(),
                    reason: format!("{:#}", e),
                }
            })?;

        let (model, version) = loaded;
        info!("Model loaded successfully - version {}", version.version);
        let value = Arc::new(LoadedModel { model, version });
        *slot = Some(Cached {
            value: value.clone(),
            loaded_at: Instant::now(),
        });
        Ok(value)
    }

    /// Template rows backing the form
    pub async fn load_template(&self) -> Result<Arc<TemplateData>, PredictionError> {
        if let Some(template) = self
            .template
            .read()
            .await
            .as_ref()
            .and_then(|c| c.fresh(self.config.template_ttl))
        {
            return Ok(template);
        }

        let mut slot = self.template.write().await;
        if let Some(template) = slot.as_ref().and_then(|c| c.fresh(self.config.template_ttl)) {
            return Ok(template);
        }

        let path = self.config.template_path.clone();
        let template = tokio::task::spawn_blocking(move || dataset::load_template(&path))
            .await
            .map_err(|e| PredictionError::Failed(e.to_string()))?
            .map_err(|e| {
                error!("Failed to load template data: {}", e);
                PredictionError::TemplateUnavailable(e.to_string())
            })?;

        debug!("Template loaded with {} rows", template.len());
        let value = Arc::new(template);
        *slot = Some(Cached {
            value: value.clone(),
            loaded_at: Instant::now(),
        });
        Ok(value)
    }

    /// Forget cached model and template so the next request reloads them
    pub async fn invalidate(&self) {
        *self.model.write().await = None;
        *self.template.write().await = None;
        info!("Predictor caches invalidated");
    }

    pub async fn model_info(&self) -> Result<ModelInfo, PredictionError> {
        let loaded = self.load_model().await?;
        let metadata = &loaded.model.metadata;
        Ok(ModelInfo {
            name: self.config.registered_model_name.clone(),
            version: loaded.version.version,
            run_id: loaded.version.run_id.clone(),
            model_type: metadata.model_type,
            trained_at: metadata.created_at,
            metrics: metadata.metrics.clone(),
            classes: loaded.model.classes.clone(),
            n_features: loaded.model.encoder.n_features(),
        })
    }

    /// Check a request against the template's age floor and the feature list
    pub async fn validate(&self, request: &PredictionRequest) -> Result<SalaryRecord, PredictionError> {
        let template = self.load_template().await?;
        let min_age = template.min_age().map(|a| a.floor() as i64).unwrap_or(0);
        validate_request(request, min_age)
    }

    pub async fn predict(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionResponse, PredictionError> {
        let record = self.validate(request).await?;
        let template = self.load_template().await?;

        let loaded = self.load_model().await?;
        let prediction = loaded
            .model
            .predict(std::slice::from_ref(&record))
            .map_err(|e| PredictionError::Failed(format!("{:#}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| PredictionError::Failed("model returned no prediction".to_string()))?;

        let share = template.job_title_share(&record.cargo_atual);
        let response = PredictionResponse {
            salary_band: clean_label(&prediction.label),
            raw_label: prediction.label,
            model_name: self.config.registered_model_name.clone(),
            model_version: loaded.version.version,
            model_type: loaded.model.metadata.model_type,
            probabilities: prediction
                .probabilities
                .into_iter()
                .map(|(label, probability)| BandProbability { label, probability })
                .collect(),
            similar_profiles: template.similar_profiles(&record.nivel, &record.uf_onde_mora),
            job_title_share: (share * 10.0).round() / 10.0,
        };

        info!(
            "Predicted '{}' with model version {}",
            response.salary_band, response.model_version
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_request() -> PredictionRequest {
        PredictionRequest::from_pairs([
            ("idade", "30"),
            ("genero", "Feminino"),
            ("pcd", "Não"),
            ("ufOndeMora", "SP"),
            ("cargoAtual", "Cientista de Dados"),
            ("nivel", "Pleno"),
            ("tempoDeExperienciaDados", "de 1 a 2 anos"),
            ("tempoDeExperienciaEmTi", "de 3 a 4 anos"),
        ])
    }

    #[test]
    fn test_clean_label_keeps_text_after_last_separator() {
        assert_eq!(
            clean_label("Faixa 5 - de R$ 8.001/mês a R$ 12.000/mês"),
            "de R$ 8.001/mês a R$ 12.000/mês"
        );
        assert_eq!(clean_label("Acima de R$ 40.001/mês"), "Acima de R$ 40.001/mês");
        assert_eq!(clean_label("a - b - c"), "c");
    }

    #[test]
    fn test_valid_request_becomes_record() {
        let record = validate_request(&full_request(), 18).unwrap();
        assert_eq!(record.idade, 30.0);
        assert_eq!(record.uf_onde_mora, "SP");
        assert_eq!(record.tempo_experiencia_ti, "de 3 a 4 anos");
    }

    #[test]
    fn test_missing_or_blank_feature_is_rejected() {
        let mut request = full_request();
        request.features.remove("nivel");
        assert!(matches!(
            validate_request(&request, 18),
            Err(PredictionError::MissingFeature(f)) if f == "nivel"
        ));

        let mut request = full_request();
        request.features.insert("genero".to_string(), json!("   "));
        assert!(matches!(
            validate_request(&request, 18),
            Err(PredictionError::MissingFeature(f)) if f == "genero"
        ));
    }

    #[test]
    fn test_age_must_be_whole_and_in_range() {
        for bad in ["abc", "30.5", "17", "101"] {
            let mut request = full_request();
            request.features.insert("idade".to_string(), json!(bad));
            let err = validate_request(&request, 18).unwrap_err();
            assert!(err.is_invalid_input(), "{} should be rejected", bad);
        }

        let mut request = full_request();
        request.features.insert("idade".to_string(), json!(42));
        assert_eq!(validate_request(&request, 18).unwrap().idade, 42.0);
    }
}
