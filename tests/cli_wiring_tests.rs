//! CLI wiring integration tests
//!
//! Tests end-to-end CLI behavior:
//! - Mode dispatch (train, predict, runs, models)
//! - Configuration file and flag resolution
//! - Exit codes
//! - Output formats
//!
//! All tests run the real binary against a temp tracking directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn salario_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_salario"))
}

fn data_file(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
}

// Test helper: config file pointing at a temp tracking dir and the bundled data
fn create_workspace() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let config = format!(
        "[tracking]\ndir = {:?}\n\n[data]\ndataset_path = {:?}\ntemplate_path = {:?}\n\n[logging]\nlevel = \"warn\"\n",
        temp_dir.path().join("mlruns"),
        data_file("dataset.csv"),
        data_file("template.csv"),
    );
    fs::write(temp_dir.path().join("salario.toml"), config).unwrap();
    temp_dir
}

fn salario(workspace: &TempDir, args: &[&str]) -> Output {
    Command::new(salario_binary())
        .arg("--config")
        .arg(workspace.path().join("salario.toml"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute salario")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({}): {}",
            e,
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn predict_args() -> Vec<&'static str> {
    vec![
        "predict",
        "--idade",
        "35",
        "--genero",
        "Feminino",
        "--pcd",
        "Não",
        "--uf",
        "SP",
        "--cargo",
        "Cientista de Dados",
        "--nivel",
        "Sênior",
        "--tempo-dados",
        "de 3 a 4 anos",
        "--tempo-ti",
        "de 5 a 6 anos",
        "--json",
    ]
}

#[test]
fn test_train_registers_new_version_each_session() {
    let workspace = create_workspace();

    let first = salario(&workspace, &["train", "--json"]);
    assert_eq!(first.status.code(), Some(0), "{}", String::from_utf8_lossy(&first.stderr));
    let summary = stdout_json(&first);
    assert_eq!(summary["registered_model"], "salario-model");
    assert_eq!(summary["registered_version"], 1);
    assert_eq!(summary["runs"].as_array().unwrap().len(), 3);

    let second = salario(&workspace, &["train", "--models", "tree", "--json"]);
    assert_eq!(second.status.code(), Some(0));
    let summary = stdout_json(&second);
    assert_eq!(summary["registered_version"], 2);
    assert_eq!(summary["best_model_type"], "decision_tree");

    let models = salario(&workspace, &["models", "salario-model", "--json"]);
    assert_eq!(models.status.code(), Some(0));
    assert_eq!(stdout_json(&models)["versions"].as_array().unwrap().len(), 2);

    let runs = salario(&workspace, &["runs", "--json"]);
    assert_eq!(runs.status.code(), Some(0));
    assert_eq!(stdout_json(&runs).as_array().unwrap().len(), 4);
}

#[test]
fn test_predict_after_training() {
    let workspace = create_workspace();
    let train = salario(&workspace, &["train", "--models", "logistic_regression"]);
    assert_eq!(train.status.code(), Some(0));
    let text = String::from_utf8_lossy(&train.stdout);
    assert!(text.contains("registered as 'salario-model' version 1"));

    let output = salario(&workspace, &predict_args());
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    let prediction = stdout_json(&output);
    let raw = prediction["raw_label"].as_str().unwrap();
    assert!(raw.starts_with("Faixa "));
    assert_eq!(prediction["salary_band"], raw.rsplit("- ").next().unwrap());
    assert_eq!(prediction["model_version"], 1);
}

#[test]
fn test_predict_without_model_fails() {
    let workspace = create_workspace();
    let output = salario(&workspace, &predict_args());
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("salario-model"));
}

#[test]
fn test_predict_rejects_age_out_of_range() {
    let workspace = create_workspace();
    salario(&workspace, &["train", "--models", "nb"]);

    let mut args = predict_args();
    args[2] = "150";
    let output = salario(&workspace, &args);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("idade"));
}

#[test]
fn test_exit_codes() {
    let workspace = create_workspace();

    // Unknown experiment is a tracking store error
    let output = salario(&workspace, &["runs", "--experiment", "missing"]);
    assert_eq!(output.status.code(), Some(2));

    let output = salario(&workspace, &["models", "missing"]);
    assert_eq!(output.status.code(), Some(2));

    let output = salario(&workspace, &["train", "--models", "svm"]);
    assert_eq!(output.status.code(), Some(1));

    let output = salario(&workspace, &["train", "--test-size", "0"]);
    assert_eq!(output.status.code(), Some(2));

    let output = Command::new(salario_binary())
        .args(["--config", "/nonexistent/salario.toml", "models"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_missing_dataset_fails_training() {
    let workspace = create_workspace();
    let output = salario(
        &workspace,
        &["train", "--data", workspace.path().join("nope.csv").to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Training failed"));
}

#[test]
fn test_models_lists_empty_registry() {
    let workspace = create_workspace();
    let output = salario(&workspace, &["models", "--json"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_json(&output), serde_json::json!([]));
}

#[test]
fn test_archived_version_is_no_longer_served() {
    let workspace = create_workspace();
    for _ in 0..2 {
        let train = salario(&workspace, &["train", "--models", "nb"]);
        assert_eq!(train.status.code(), Some(0));
    }

    let output = salario(&workspace, &["models", "salario-model", "--archive", "2", "--json"]);
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    let archived = stdout_json(&output);
    assert_eq!(archived["version"], 2);
    assert_eq!(archived["status"], "Archived");

    let output = salario(&workspace, &predict_args());
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_json(&output)["model_version"], 1);

    let output = salario(&workspace, &["models", "salario-model", "--archive", "9"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_scoring_metric_from_config_file_is_validated() {
    let workspace = create_workspace();
    let path = workspace.path().join("salario.toml");
    let mut config = fs::read_to_string(&path).unwrap();
    config.push_str("\n[training]\nscoring_metric = \"bogus\"\n");
    fs::write(&path, config).unwrap();

    let output = salario(&workspace, &["train"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("bogus"));
}
