//! Error types for the adapter

use std::path::PathBuf;

use nanoleaf_api::ApiError;
use nanoleaf_discovery::DiscoveryError;
use thiserror::Error;

use crate::logging::LoggingError;

/// Problems with the operator-supplied configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Please check adapter config ({0}) first!")]
    Missing(&'static str),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Errors that stop the adapter
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 401/403 on connect; a new authorization token is needed
    #[error("{0}")]
    Authorization(String),

    /// Any other HTTP status on connect
    #[error("{0}")]
    Protocol(String),

    #[error("Invalid device info received from nanoleaf controller: {0}")]
    InvalidDeviceInfo(String),

    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("{}", .0.format_error())]
    Api(#[from] ApiError),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
