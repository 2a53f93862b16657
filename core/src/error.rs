//! Error types for conversion config loading.
//!
//! Validation failures of model data have their own type,
//! [`ValidationError`](crate::ValidationError).

use thiserror::Error;

/// Errors that can occur while loading or saving a [`CliConfig`](crate::CliConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A setting has a value the converter cannot use.
    #[error("invalid setting for {key}: {message}")]
    InvalidSetting { key: String, message: String },
}

/// Convenience alias for results with [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;
