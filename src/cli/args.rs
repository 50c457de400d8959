//! CLI argument parsing
//!
//! ```text
//! salario [--config <file>] [--tracking-dir <dir>] <mode> [mode-args]
//!
//! MODES:
//!   train     Fit every classifier, log runs, register the best one
//!   serve     Prediction web page and JSON API
//!   ui        Tracking UI over experiments, runs and models
//!   predict   One prediction from the command line
//!   runs      List tracked runs
//!   models    List registered models or show one
//! ```

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Parsed CLI arguments
#[derive(Debug, Clone, Parser)]
#[command(
    name = "salario",
    version,
    about = "Salary-band prediction for data professionals"
)]
pub struct Args {
    /// Configuration file (.toml, .json or .yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Tracking directory holding runs and registered models
    #[arg(long, global = true)]
    pub tracking_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI modes
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Train the classifiers and register the best run
    Train(TrainArgs),
    /// Serve the prediction page and JSON API
    Serve(ServeArgs),
    /// Serve the tracking UI
    Ui(UiArgs),
    /// Predict the salary band of one profile
    Predict(PredictArgs),
    /// List runs of an experiment
    Runs(RunsArgs),
    /// List registered models, or show the versions of one
    Models(ModelsArgs),
}

#[derive(Debug, Clone, ClapArgs)]
pub struct TrainArgs {
    /// Labeled CSV dataset
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Comma-separated model types (logistic_regression, decision_tree, naive_bayes)
    #[arg(long, value_delimiter = ',')]
    pub models: Option<Vec<String>>,

    /// Fraction of rows held out for evaluation
    #[arg(long)]
    pub test_size: Option<f64>,

    /// Seed of the train/test split
    #[arg(long)]
    pub seed: Option<u64>,

    /// Metric used to pick the registered run
    #[arg(long)]
    pub scoring: Option<String>,

    /// Print the training summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Template CSV backing the form
    #[arg(long)]
    pub template: Option<PathBuf>,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct UiArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct PredictArgs {
    #[arg(long)]
    pub idade: i64,

    #[arg(long)]
    pub genero: String,

    #[arg(long)]
    pub pcd: String,

    /// State (UF)
    #[arg(long)]
    pub uf: String,

    /// Current job title
    #[arg(long)]
    pub cargo: String,

    /// Seniority level
    #[arg(long)]
    pub nivel: String,

    /// Experience with data
    #[arg(long)]
    pub tempo_dados: String,

    /// Experience with IT
    #[arg(long)]
    pub tempo_ti: String,

    /// Template CSV used for validation and statistics
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Print the prediction as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct RunsArgs {
    /// Experiment name or id (defaults to the configured experiment)
    #[arg(long)]
    pub experiment: Option<String>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct ModelsArgs {
    /// Registered model to show
    pub name: Option<String>,

    /// Archive this version of the named model so it is no longer served
    #[arg(long, requires = "name")]
    pub archive: Option<u32>,

    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("salario").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_train_flags() {
        let args = parse(&[
            "--tracking-dir",
            "/tmp/runs",
            "train",
            "--data",
            "data/dataset.csv",
            "--models",
            "decision_tree,naive_bayes",
            "--seed",
            "7",
        ]);
        assert_eq!(args.tracking_dir, Some(PathBuf::from("/tmp/runs")));
        match args.command {
            Command::Train(train) => {
                assert_eq!(
                    train.models,
                    Some(vec!["decision_tree".to_string(), "naive_bayes".to_string()])
                );
                assert_eq!(train.seed, Some(7));
                assert!(!train.json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&["serve", "--port", "9000", "--config", "salario.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("salario.toml")));
        assert!(matches!(args.command, Command::Serve(ServeArgs { port: Some(9000), .. })));
    }

    #[test]
    fn test_predict_requires_every_feature() {
        let missing = Args::try_parse_from(["salario", "predict", "--idade", "30"]);
        assert!(missing.is_err());

        let args = parse(&[
            "predict",
            "--idade",
            "30",
            "--genero",
            "Feminino",
            "--pcd",
            "Não",
            "--uf",
            "SP",
            "--cargo",
            "Analista de Dados",
            "--nivel",
            "Pleno",
            "--tempo-dados",
            "de 1 a 2 anos",
            "--tempo-ti",
            "de 3 a 4 anos",
            "--json",
        ]);
        assert!(matches!(args.command, Command::Predict(PredictArgs { json: true, .. })));
    }

    #[test]
    fn test_archive_needs_a_model_name() {
        assert!(Args::try_parse_from(["salario", "models", "--archive", "2"]).is_err());
        let args = parse(&["models", "salario-model", "--archive", "2"]);
        assert!(matches!(
            args.command,
            Command::Models(ModelsArgs { archive: Some(2), .. })
        ));
    }

    #[test]
    fn test_mode_is_required() {
        assert!(Args::try_parse_from(["salario"]).is_err());
    }
}
