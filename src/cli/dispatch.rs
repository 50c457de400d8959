//! CLI mode dispatch
//!
//! Resolves the configuration, installs logging, and dispatches to the mode
//! handlers:
//! - train: fit classifiers, log runs, register the best run
//! - serve / ui: start the HTTP servers
//! - predict: single prediction from flags
//! - runs / models: inspect the tracking directory

use std::sync::Arc;

use salario_api::{ApiConfig, ApiServer, TrackingServer};
use salario_core::config::{ConfigManager, SalarioConfig};
use salario_core::ml_integration::{
    ClassificationMetrics, Experiment, ModelRegistry, ModelType, PredictionRequest,
    SalaryPredictor, TrackingError, TrackingStore, TrainingOrchestrator, TrainingSummary,
};
use tracing::{error, info};

use crate::cli::args::{Args, Command, PredictArgs};
use crate::cli::{Error, Result, EXIT_SUCCESS};
use crate::logging;

/// Exit code wrapper for CLI operations
pub type ExitCode = i32;

/// Run the parsed command and return its exit code
pub async fn run(args: Args) -> ExitCode {
    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return e.exit_code();
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Warning: {}", e);
    }

    match run_mode(args.command, config).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

/// Configuration file (or defaults), then env overrides, then flags
pub fn resolve_config(args: &Args) -> Result<SalarioConfig> {
    let manager = match &args.config {
        Some(path) => ConfigManager::from_file(path),
        None => ConfigManager::new(),
    }
    .map_err(|e| Error::Config(format!("{:#}", e)))?;

    let mut config = manager.into_config();
    if let Some(dir) = &args.tracking_dir {
        config.tracking.dir = dir.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    apply_command_overrides(&args.command, &mut config)?;

    config
        .validate()
        .map_err(|e| Error::Config(e.to_string()))?;
    Ok(config)
}

fn apply_command_overrides(command: &Command, config: &mut SalarioConfig) -> Result<()> {
    match command {
        Command::Train(train) => {
            if let Some(data) = &train.data {
                config.data.dataset_path = data.clone();
            }
            if let Some(models) = &train.models {
                config.training.model_types = models
                    .iter()
                    .map(|name| {
                        name.parse::<ModelType>()
                            .map_err(|e| Error::InvalidArgs(e.to_string()))
                    })
                    .collect::<Result<Vec<_>>>()?;
            }
            if let Some(test_size) = train.test_size {
                config.training.test_size = test_size;
            }
            if let Some(seed) = train.seed {
                config.training.random_seed = seed;
            }
            if let Some(scoring) = &train.scoring {
                if !ClassificationMetrics::is_known(scoring) {
                    return Err(Error::InvalidArgs(format!(
                        "Unknown scoring metric '{}' (expected one of {})",
                        scoring,
                        ClassificationMetrics::NAMES.join(", ")
                    )));
                }
                config.training.scoring_metric = scoring.clone();
            }
        }
        Command::Serve(serve) => {
            if let Some(host) = &serve.host {
                config.serving.host = host.clone();
            }
            if let Some(port) = serve.port {
                config.serving.port = port;
            }
            if let Some(template) = &serve.template {
                config.data.template_path = template.clone();
            }
        }
        Command::Ui(ui) => {
            if let Some(host) = &ui.host {
                config.ui.host = host.clone();
            }
            if let Some(port) = ui.port {
                config.ui.port = port;
            }
        }
        Command::Predict(predict) => {
            if let Some(template) = &predict.template {
                config.data.template_path = template.clone();
            }
        }
        Command::Runs(_) | Command::Models(_) => {}
    }
    Ok(())
}

fn open_registry(config: &SalarioConfig) -> Result<ModelRegistry> {
    let store = TrackingStore::open(&config.tracking.dir)?;
    Ok(ModelRegistry::new(store))
}

fn api_config(config: &SalarioConfig, host: &str, port: u16) -> ApiConfig {
    ApiConfig {
        host: host.to_string(),
        port,
        version: env!("CARGO_PKG_VERSION").to_string(),
        tracking_dir: config.tracking.dir.clone(),
    }
}

async fn run_mode(command: Command, config: SalarioConfig) -> Result<()> {
    match command {
        Command::Train(train) => run_train(config, train.json).await,
        Command::Serve(_) => run_serve(config).await,
        Command::Ui(_) => run_ui(config).await,
        Command::Predict(predict) => run_predict(config, predict).await,
        Command::Runs(runs) => run_runs(config, runs.experiment, runs.json),
        Command::Models(models) => match (models.name, models.archive) {
            (Some(name), Some(version)) => run_archive(config, &name, version, models.json),
            (name, _) => run_models(config, name, models.json),
        },
    }
}

async fn run_train(config: SalarioConfig, json: bool) -> Result<()> {
    let registry = open_registry(&config)?;
    let data_path = config.data.dataset_path.clone();
    let training = config.training.clone();
    info!("Training on {}", data_path.display());

    let summary = tokio::task::spawn_blocking(move || {
        TrainingOrchestrator::new(registry).run(&data_path, &training)
    })
    .await
    .map_err(|e| Error::Training(e.to_string()))?
    .map_err(|e| Error::Training(format!("{:#}", e)))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, &config.training.scoring_metric);
    }
    Ok(())
}

fn format_metric(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v))
}

fn print_summary(summary: &TrainingSummary, scoring: &str) {
    println!("Experiment {}", summary.experiment_id);
    println!(
        "{:<34} {:<22} {:>9} {:>9} {:>9} {:>9}",
        "RUN", "MODEL", "ACCURACY", "F1", "ROC_AUC", "LOG_LOSS"
    );
    for run in &summary.runs {
        match &run.metrics {
            Some(m) => println!(
                "{:<34} {:<22} {:>9} {:>9} {:>9} {:>9}",
                run.run_id,
                run.model_type.display_name(),
                format_metric(Some(m.accuracy)),
                format_metric(Some(m.f1_score)),
                format_metric(m.roc_auc),
                format_metric(Some(m.log_loss)),
            ),
            None => println!(
                "{:<34} {:<22} failed: {}",
                run.run_id,
                run.model_type.display_name(),
                run.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    println!(
        "Best by {}: {} ({}), registered as '{}' version {}",
        scoring,
        summary.best_run_id,
        summary.best_model_type.display_name(),
        summary.registered_model,
        summary.registered_version
    );
}

async fn run_serve(config: SalarioConfig) -> Result<()> {
    let registry = open_registry(&config)?;
    let predictor = Arc::new(SalaryPredictor::new(registry, config.predictor_config()));
    let api = api_config(&config, &config.serving.host, config.serving.port);
    ApiServer::new(api, predictor)
        .start()
        .await
        .map_err(|e| Error::Server(format!("{:#}", e)))
}

async fn run_ui(config: SalarioConfig) -> Result<()> {
    let registry = open_registry(&config)?;
    let api = api_config(&config, &config.ui.host, config.ui.port);
    TrackingServer::new(api, registry)
        .start()
        .await
        .map_err(|e| Error::Server(format!("{:#}", e)))
}

fn prediction_request(args: &PredictArgs) -> PredictionRequest {
    PredictionRequest::from_pairs([
        ("idade", args.idade.to_string()),
        ("genero", args.genero.clone()),
        ("pcd", args.pcd.clone()),
        ("ufOndeMora", args.uf.clone()),
        ("cargoAtual", args.cargo.clone()),
        ("nivel", args.nivel.clone()),
        ("tempoDeExperienciaDados", args.tempo_dados.clone()),
        ("tempoDeExperienciaEmTi", args.tempo_ti.clone()),
    ])
}

async fn run_predict(config: SalarioConfig, args: PredictArgs) -> Result<()> {
    let registry = open_registry(&config)?;
    let predictor = SalaryPredictor::new(registry, config.predictor_config());
    let response = predictor.predict(&prediction_request(&args)).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("Faixa salarial estimada: {}", response.salary_band);
    println!(
        "Modelo: {} versão {} ({})",
        response.model_name,
        response.model_version,
        response.model_type.display_name()
    );
    println!("Perfis similares na base: {}", response.similar_profiles);
    println!("Representatividade do cargo: {:.1}%", response.job_title_share);
    for band in &response.probabilities {
        println!("  {:>6.1}%  {}", band.probability * 100.0, band.label);
    }
    Ok(())
}

fn find_experiment(store: &TrackingStore, key: &str) -> Result<Experiment> {
    match store.get_experiment(key) {
        Ok(experiment) => Ok(experiment),
        Err(TrackingError::ExperimentNotFound(_)) => Ok(store
            .get_experiment_by_name(key)?
            .ok_or_else(|| TrackingError::ExperimentNotFound(key.to_string()))?),
        Err(e) => Err(e.into()),
    }
}

fn run_runs(config: SalarioConfig, experiment: Option<String>, json: bool) -> Result<()> {
    let store = TrackingStore::open(&config.tracking.dir)?;
    let key = experiment.unwrap_or_else(|| config.training.experiment_name.clone());
    let experiment = find_experiment(&store, &key)?;
    let runs = store.list_runs(&experiment.experiment_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    println!(
        "Experiment {} ({}): {} runs",
        experiment.experiment_id,
        experiment.name,
        runs.len()
    );
    for run in &runs {
        println!(
            "{:<34} {:<22} {:<9} {} f1={}",
            run.run_id,
            run.run_name,
            format!("{:?}", run.status),
            run.start_time.format("%Y-%m-%d %H:%M:%S"),
            format_metric(run.metric("f1")),
        );
    }
    Ok(())
}

fn run_archive(config: SalarioConfig, name: &str, version: u32, json: bool) -> Result<()> {
    let registry = open_registry(&config)?;
    let archived = registry.archive_version(name, version)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&archived)?);
        return Ok(());
    }

    println!("Archived {} version {}", name, archived.version);
    match registry.latest_version(name) {
        Ok(latest) => println!("Now serving version {}", latest.version),
        Err(TrackingError::ModelNotFound(_)) => println!("No servable versions left"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn run_models(config: SalarioConfig, name: Option<String>, json: bool) -> Result<()> {
    let registry = open_registry(&config)?;

    let Some(name) = name else {
        let models = registry.list_registered_models()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&models)?);
        } else if models.is_empty() {
            println!("No registered models in {}", config.tracking.dir.display());
        } else {
            for model in &models {
                let latest = model
                    .latest_version()
                    .map_or_else(|| "-".to_string(), |v| v.version.to_string());
                println!(
                    "{:<24} latest={:<4} versions={}",
                    model.name,
                    latest,
                    model.versions.len()
                );
            }
        }
        return Ok(());
    };

    let model = registry.get_registered_model(&name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&model)?);
        return Ok(());
    }

    println!("{} ({})", model.name, model.description);
    for version in &model.versions {
        println!(
            "  v{:<4} {:<9} run={} model={} f1={}",
            version.version,
            format!("{:?}", version.status),
            version.run_id,
            version.model_type.map_or("-", |t| t.display_name()),
            format_metric(version.metrics.as_ref().map(|m| m.f1_score)),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn args_with_config(dir: &TempDir, rest: &[&str]) -> Args {
        let config = dir.path().join("salario.toml");
        fs::write(&config, "[logging]\nlevel = \"warn\"\n").unwrap();
        let mut argv = vec![
            "salario".to_string(),
            "--config".to_string(),
            config.display().to_string(),
        ];
        argv.extend(rest.iter().map(|s| s.to_string()));
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_config() {
        let dir = TempDir::new().unwrap();
        let args = args_with_config(
            &dir,
            &[
                "--tracking-dir",
                "/tmp/salario-runs",
                "train",
                "--models",
                "tree,nb",
                "--test-size",
                "0.3",
            ],
        );
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.tracking.dir, PathBuf::from("/tmp/salario-runs"));
        assert_eq!(
            config.training.model_types,
            vec![ModelType::DecisionTree, ModelType::NaiveBayes]
        );
        assert_eq!(config.training.test_size, 0.3);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_bad_values_map_to_exit_codes() {
        let dir = TempDir::new().unwrap();

        let args = args_with_config(&dir, &["train", "--models", "svm"]);
        assert_eq!(resolve_config(&args).unwrap_err().exit_code(), 1);

        let args = args_with_config(&dir, &["train", "--test-size", "1.5"]);
        assert_eq!(resolve_config(&args).unwrap_err().exit_code(), 2);

        let args = Args::try_parse_from(["salario", "--config", "/nonexistent/x.toml", "runs"]).unwrap();
        assert_eq!(resolve_config(&args).unwrap_err().exit_code(), 2);
    }
}
