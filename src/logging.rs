//! Logging setup for the CLI.
//!
//! Installs a global tracing subscriber writing to stderr, as text or JSON,
//! and optionally to a daily-rotated file under the configured log directory.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use salario_core::config::LoggingSettings;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

const LOG_FILE_PREFIX: &str = "salario.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to create the log directory.
    #[error("Failed to prepare log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to set the global tracing subscriber.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// `RUST_LOG` when set, otherwise the configured level, otherwise `info`
pub fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn file_writer(dir: &Path) -> Result<tracing_appender::non_blocking::NonBlocking, LoggingError> {
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
    let _ = LOG_GUARD.set(guard);
    Ok(writer)
}

/// Initialize tracing. Subsequent calls are no-ops.
pub fn init(settings: &LoggingSettings) -> Result<(), LoggingError> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let stderr_layer = if settings.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file_layer = match &settings.directory {
        Some(dir) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer(dir)?),
        ),
        None => None,
    };

    let subscriber = Registry::default()
        .with(build_env_filter(&settings.level))
        .with(stderr_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = INITIALIZED.set(());

    if let Some(dir) = &settings.directory {
        tracing::debug!("Logging to {}", dir.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_writer_creates_directory() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("nested").join("logs");
        file_writer(&logs).unwrap();
        assert!(logs.is_dir());
    }

    #[test]
    fn invalid_level_falls_back() {
        // neither panics nor errors on garbage directives
        let _ = build_env_filter("not a level ===");
    }
}
