//! Error types for the configuration layer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or saving a [`crate::CacheConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
