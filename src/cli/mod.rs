//! CLI module
//!
//! Provides:
//! - Argument parsing for the train, serve, ui, predict, runs and models modes
//! - Configuration resolution (file → env → flags)
//! - Mode dispatch with deterministic exit codes

pub mod args;
pub mod dispatch;

// Re-exports
pub use args::{Args, Command};
pub use dispatch::{run, ExitCode};

use salario_core::ml_integration::{PredictionError, TrackingError};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tracking store error: {0}")]
    Store(#[from] TrackingError),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Prediction failed: {0}")]
    Prediction(#[from] PredictionError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Exit code reported for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::Config(_) | Error::Store(_) => EXIT_CONFIG_ERROR,
            _ => EXIT_FAILURE,
        }
    }
}

/// Exit codes (deterministic)
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;
