//! Where devtap keeps its config file and logs.
//!
//! Everything lives under one data directory, `~/.devtap` unless `--data-dir` names another.

use std::path::PathBuf;
use std::sync::OnceLock;

const DATA_DIR_NAME: &str = ".devtap";

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Fix the data directory for the rest of the process. Call once from `main` before any
/// other path is derived; later calls keep the first value.
pub fn init_data_dir(custom_path: Option<PathBuf>) -> PathBuf {
    let path = resolve_data_dir(custom_path, dirs::home_dir());
    if DATA_DIR.set(path.clone()).is_err() {
        tracing::debug!(path = %path.display(), "Data directory already fixed; ignoring");
    }
    data_dir()
}

/// `custom` wins; otherwise `.devtap` under `home`, or under the working directory.
fn resolve_data_dir(custom: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    match custom {
        Some(path) => path,
        None => home.map_or_else(|| PathBuf::from(DATA_DIR_NAME), |h| h.join(DATA_DIR_NAME)),
    }
}

pub fn data_dir() -> PathBuf {
    DATA_DIR
        .get()
        .cloned()
        .unwrap_or_else(|| resolve_data_dir(None, dirs::home_dir()))
}

pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

pub fn log_file_path() -> PathBuf {
    logs_dir().join("devtap.log")
}

pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}
