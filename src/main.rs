//! Salario CLI
//!
//! Modes:
//! - train: fit the classifiers and register the best run
//! - serve: prediction page and JSON API
//! - ui: tracking UI over experiments, runs and registered models
//! - predict / runs / models: command-line access to the same data
//!
//! Exit codes: 0 success, 1 failure, 2 configuration or tracking store error

use clap::Parser;

use salario::cli::{run, Args};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let code = run(args).await;
    std::process::exit(code);
}
