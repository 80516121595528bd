use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "TASKFLOW_LOG";
pub const LOG_FILE_NAME: &str = "taskflow.log";

/// Where log lines go. The TUI owns the terminal, so it logs to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to initialize tracing subscriber: {0}")]
    Init(String),
}

/// Filter directive: `--verbose` wins over the configured level
pub fn level_for(configured: &str, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else if configured.trim().is_empty() {
        "warn".to_string()
    } else {
        configured.trim().to_string()
    }
}

/// Install the global subscriber. `TASKFLOW_LOG` overrides `level`.
pub fn init_tracing(level: &str, target: LogTarget) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));

    let result = match target {
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| LoggingError::OpenFile {
                    path: path.clone(),
                    source,
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| LoggingError::OpenFile { path: path.clone(), source })?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
    };

    result.map_err(|error| LoggingError::Init(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_overrides_config_level() {
        assert_eq!(level_for("info", true), "debug");
        assert_eq!(level_for(" info ", false), "info");
        assert_eq!(level_for("", false), "warn");
    }
}
