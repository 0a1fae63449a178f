mod config;
pub mod database;
mod migrations;

pub use config::{AccountConfig, Config, RemoteConfig, RemoteKind, SchedulerConfig};
pub use database::{Namespace, PreferenceStore, SharedStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/eyerest[-dev]/` based on EYEREST_ENV.
///
/// Set EYEREST_ENV=dev to use a development data directory.
/// EYEREST_DATA_DIR overrides the location entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("EYEREST_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("EYEREST_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("eyerest-dev")
            } else {
                base_dir.join("eyerest")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
