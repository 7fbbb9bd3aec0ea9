use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors raised while loading or validating service settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The settings file is not valid JSON for the settings shape.
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment override could not be interpreted.
    #[error("Invalid value '{value}' for environment variable {key}")]
    InvalidEnv { key: String, value: String },

    /// One or more settings are out of range or missing.
    #[error("Settings validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
}
