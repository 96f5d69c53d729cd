use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::app_dirs::AppDirs;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("could not open log file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("could not install log subscriber: {0}")]
    Install(String),
}

/// Default filter when `RUST_LOG` is not set.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "tenfinger=debug"
    } else {
        "tenfinger=info"
    }
}

/// Sends `tracing` output to the state-directory log file; the terminal belongs to the
/// TUI. Returns the path written to, or `None` when no state directory exists.
pub fn init(verbose: bool) -> Result<Option<PathBuf>, LoggingError> {
    match AppDirs::log_path() {
        Some(path) => init_at(&path, verbose).map(|()| Some(path)),
        None => Ok(None),
    }
}

pub fn init_at(path: &Path, verbose: bool) -> Result<(), LoggingError> {
    let open_error = |source| LoggingError::Open {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(open_error)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(open_error)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose))),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))
}
