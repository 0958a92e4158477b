//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("KDL parse error: {0}")]
    Parse(#[from] kdl::KdlError),

    #[error("invalid setting key '{0}': keys are upper-case letters, digits and underscores")]
    InvalidKey(String),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("invalid override '{0}': expected KEY=VALUE")]
    InvalidOverride(String),

    #[error("config file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("could not determine git commit: {0}")]
    GitCommit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
