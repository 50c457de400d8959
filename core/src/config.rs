//! Configuration Management Module
//!
//! File-based configuration for training, serving and logging, with
//! environment variable overrides and validation.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::ml_integration::metadata::{ClassificationMetrics, TrainingConfig};
use crate::ml_integration::predictor::PredictorConfig;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "SALARIO_";

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub enum ConfigFormat {
    Json,
    #[default]
    Toml,
    Yaml,
}

impl std::str::FromStr for ConfigFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(anyhow!("Unsupported config format: {}", s)),
        }
    }
}

impl ConfigFormat {
    fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
            ConfigFormat::Yaml => "yaml",
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SalarioConfig {
    pub tracking: TrackingSettings,
    pub data: DataSettings,
    pub training: TrainingConfig,
    pub serving: ServingSettings,
    pub ui: UiSettings,
    pub logging: LoggingSettings,
}

/// Where runs and registered models live
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackingSettings {
    pub dir: PathBuf,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("mlruns"),
        }
    }
}

/// Input files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataSettings {
    /// Labeled training dataset
    pub dataset_path: PathBuf,
    /// Unlabeled rows backing the prediction form
    pub template_path: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/dataset.csv"),
            template_path: PathBuf::from("data/template.csv"),
        }
    }
}

/// Prediction server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServingSettings {
    pub host: String,
    pub port: u16,
    pub model_cache_ttl_secs: u64,
    pub template_cache_ttl_secs: u64,
}

impl Default for ServingSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            model_cache_ttl_secs: 24 * 60 * 60,
            template_cache_ttl_secs: 60 * 60,
        }
    }
}

/// Tracking UI server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiSettings {
    pub host: String,
    pub port: u16,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
    /// Also write daily-rotated log files here
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}

impl SalarioConfig {
    /// Predictor settings derived from the data and serving sections
    pub fn predictor_config(&self) -> PredictorConfig {
        PredictorConfig {
            registered_model_name: self.training.registered_model_name.clone(),
            template_path: self.data.template_path.clone(),
            model_ttl: Duration::from_secs(self.serving.model_cache_ttl_secs),
            template_ttl: Duration::from_secs(self.serving.template_cache_ttl_secs),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let training = &self.training;
        if !(training.test_size > 0.0 && training.test_size < 1.0) {
            return Err(anyhow!(
                "test_size must be between 0 and 1, got {}",
                training.test_size
            ));
        }
        if !ClassificationMetrics::is_known(&training.scoring_metric) {
            return Err(anyhow!(
                "Unknown scoring metric '{}' (expected one of {})",
                training.scoring_metric,
                ClassificationMetrics::NAMES.join(", ")
            ));
        }
        if training.model_types.is_empty() {
            return Err(anyhow!("At least one model type must be configured"));
        }
        if training.registered_model_name.trim().is_empty() {
            return Err(anyhow!("Registered model name cannot be empty"));
        }
        if training.experiment_name.trim().is_empty() {
            return Err(anyhow!("Experiment name cannot be empty"));
        }
        if self.tracking.dir.as_os_str().is_empty() {
            return Err(anyhow!("Tracking directory cannot be empty"));
        }
        if self.serving.port == 0 || self.ui.port == 0 {
            return Err(anyhow!("Ports must be non-zero"));
        }
        Ok(())
    }
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
    config_format: ConfigFormat,
    config: SalarioConfig,
}

impl ConfigManager {
    /// Load the configuration from the default location, creating it if missing
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        let config_path = config_dir.join("salario").join("config");
        let config_format = Self::detect_config_format(&config_path)?;

        let mut manager = Self {
            config_path,
            config_format,
            config: SalarioConfig::default(),
        };

        if manager.config_exists() {
            manager.load_config()?;
        } else if let Err(e) = manager.save_config() {
            warn!("Could not write default configuration: {}", e);
        }

        manager.apply_env_overrides();
        Ok(manager)
    }

    /// Load the configuration from an explicit file; the extension picks the format
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("toml")
            .parse::<ConfigFormat>()?;

        let mut manager = Self {
            config_path: path.to_path_buf(),
            config_format,
            config: SalarioConfig::default(),
        };
        manager.load_config()?;
        manager.apply_env_overrides();
        Ok(manager)
    }

    /// Create configuration manager with custom base path (no extension)
    pub fn with_path<P: AsRef<Path>>(path: P, format: ConfigFormat) -> Result<Self> {
        let mut manager = Self {
            config_path: path.as_ref().with_extension(format.extension()),
            config_format: format,
            config: SalarioConfig::default(),
        };

        if manager.config_exists() {
            manager.load_config()?;
        } else {
            manager.save_config()?;
        }

        manager.apply_env_overrides();
        Ok(manager)
    }

    fn get_config_dir() -> Result<PathBuf> {
        dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))
    }

    /// Detect configuration format based on which file exists
    fn detect_config_format(base_path: &Path) -> Result<ConfigFormat> {
        for ext in ["toml", "json", "yaml", "yml"] {
            if base_path.with_extension(ext).exists() {
                return ext.parse();
            }
        }

        // Default to TOML if no file exists
        Ok(ConfigFormat::Toml)
    }

    pub fn config_exists(&self) -> bool {
        self.get_config_file_path().exists()
    }

    /// Get the full configuration file path
    pub fn get_config_file_path(&self) -> PathBuf {
        if self.config_path.extension().is_some() {
            return self.config_path.clone();
        }
        let yml = self.config_path.with_extension("yml");
        if self.config_format == ConfigFormat::Yaml && yml.exists() {
            return yml;
        }
        self.config_path.with_extension(self.config_format.extension())
    }

    /// Load configuration from file
    pub fn load_config(&mut self) -> Result<()> {
        let config_file = self.get_config_file_path();

        if !config_file.exists() {
            return Err(anyhow!("Configuration file not found: {:?}", config_file));
        }

        let content = fs::read_to_string(&config_file)
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", config_file, e))?;

        self.config = match self.config_format {
            ConfigFormat::Toml => toml::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse TOML config: {}", e))?,
            ConfigFormat::Json => serde_json::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse JSON config: {}", e))?,
            ConfigFormat::Yaml => serde_yaml::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse YAML config: {}", e))?,
        };

        info!("Loaded configuration from {:?}", config_file);
        Ok(())
    }

    /// Save configuration to file
    pub fn save_config(&self) -> Result<()> {
        let config_file = self.get_config_file_path();

        if let Some(parent) = config_file.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| anyhow!("Failed to create config directory {:?}: {}", parent, e))?;
        }

        let content = match self.config_format {
            ConfigFormat::Toml => toml::to_string_pretty(&self.config)
                .map_err(|e| anyhow!("Failed to serialize TOML config: {}", e))?,
            ConfigFormat::Json => serde_json::to_string_pretty(&self.config)
                .map_err(|e| anyhow!("Failed to serialize JSON config: {}", e))?,
            ConfigFormat::Yaml => serde_yaml::to_string(&self.config)
                .map_err(|e| anyhow!("Failed to serialize YAML config: {}", e))?,
        };

        fs::write(&config_file, content)
            .map_err(|e| anyhow!("Failed to write config file {:?}: {}", config_file, e))?;

        info!("Saved configuration to {:?}", config_file);
        Ok(())
    }

    /// Apply `SALARIO_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok());
    }

    /// Apply overrides from any key lookup (keys without the prefix)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let config = &mut self.config;

        if let Some(dir) = lookup("TRACKING_DIR") {
            config.tracking.dir = PathBuf::from(dir);
            debug!("Applied env override for tracking dir");
        }
        if let Some(name) = lookup("MODEL_NAME") {
            config.training.registered_model_name = name;
            debug!("Applied env override for model name");
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            config.logging.level = level;
            debug!("Applied env override for log level");
        }
        if let Some(host) = lookup("HOST") {
            config.serving.host = host;
            debug!("Applied env override for host");
        }
        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    config.serving.port = port;
                    debug!("Applied env override for port");
                }
                Err(_) => warn!("Ignoring invalid {}PORT value '{}'", ENV_PREFIX, port),
            }
        }
        if let Some(path) = lookup("DATA_PATH") {
            config.data.dataset_path = PathBuf::from(path);
            debug!("Applied env override for dataset path");
        }
        if let Some(path) = lookup("TEMPLATE_PATH") {
            config.data.template_path = PathBuf::from(path);
            debug!("Applied env override for template path");
        }
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &SalarioConfig {
        &self.config
    }

    /// Get mutable configuration
    pub fn get_config_mut(&mut self) -> &mut SalarioConfig {
        &mut self.config
    }

    pub fn into_config(self) -> SalarioConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml_integration::metadata::ModelType;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = SalarioConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.serving.port, 8501);
        assert_eq!(config.ui.port, 5000);
        assert_eq!(config.training.scoring_metric, "f1");
        assert_eq!(
            config.predictor_config().model_ttl,
            Duration::from_secs(86400)
        );
    }

    #[test]
    fn test_with_path_round_trips_every_format() {
        let temp_dir = TempDir::new().unwrap();
        for format in [ConfigFormat::Toml, ConfigFormat::Json, ConfigFormat::Yaml] {
            let base = temp_dir.path().join(format!("config_{:?}", format));
            let mut manager = ConfigManager::with_path(&base, format.clone()).unwrap();
            assert!(manager.config_exists());

            manager.get_config_mut().serving.port = 9000;
            manager.get_config_mut().training.model_types = vec![ModelType::NaiveBayes];
            manager.save_config().unwrap();

            let reloaded = ConfigManager::with_path(&base, format).unwrap();
            assert_eq!(reloaded.get_config().serving.port, 9000);
            assert_eq!(
                reloaded.get_config().training.model_types,
                vec![ModelType::NaiveBayes]
            );
        }
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("salario.toml");
        fs::write(&path, "[tracking]\ndir = \"/srv/mlruns\"\n").unwrap();

        let manager = ConfigManager::from_file(&path).unwrap();
        let config = manager.get_config();
        assert_eq!(config.tracking.dir, PathBuf::from("/srv/mlruns"));
        assert_eq!(config.data.template_path, PathBuf::from("data/template.csv"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_overrides_replace_values() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager =
            ConfigManager::with_path(temp_dir.path().join("config"), ConfigFormat::Toml).unwrap();

        let vars = HashMap::from([
            ("TRACKING_DIR", "/tmp/runs"),
            ("MODEL_NAME", "other-model"),
            ("PORT", "not-a-port"),
            ("TEMPLATE_PATH", "t.csv"),
        ]);
        manager.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        let config = manager.get_config();
        assert_eq!(config.tracking.dir, PathBuf::from("/tmp/runs"));
        assert_eq!(config.training.registered_model_name, "other-model");
        assert_eq!(config.data.template_path, PathBuf::from("t.csv"));
        // invalid values are ignored
        assert_eq!(config.serving.port, 8501);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = SalarioConfig::default();
        config.training.test_size = 1.5;
        assert!(config.validate().is_err());

        let mut config = SalarioConfig::default();
        config.training.model_types.clear();
        assert!(config.validate().is_err());

        assert!("ini".parse::<ConfigFormat>().is_err());
        assert_eq!("yml".parse::<ConfigFormat>().unwrap(), ConfigFormat::Yaml);
    }

    #[test]
    fn test_unknown_scoring_metric_is_rejected() {
        let mut config = SalarioConfig::default();
        config.training.scoring_metric = "bogus".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bogus"));

        for metric in ["f1", "f1_score", "accuracy", "roc_auc", "log_loss"] {
            config.training.scoring_metric = metric.to_string();
            assert!(config.validate().is_ok(), "{} should be accepted", metric);
        }
    }

    #[test]
    fn test_unknown_scoring_metric_in_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("salario.toml");
        fs::write(&path, "[training]\nscoring_metric = \"bogus\"\n").unwrap();
        let manager = ConfigManager::from_file(&path).unwrap();
        assert!(manager.get_config().validate().is_err());
    }
}
