//! Application error types.

use sxmm_gateway::GatewayError;
use thiserror::Error;

/// Missing or invalid configuration. Fatal before any order is placed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(&'static str),

    #[error("Invalid symbol: {0}")]
    Symbol(#[from] sxmm_core::CoreError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Authentication or key setup failed; no order was placed.
    #[error("Setup failed: {0}")]
    Setup(#[from] GatewayError),

    /// The run could not continue (e.g. failure budget exhausted).
    #[error("Unrecoverable runtime error: {0}")]
    Unrecoverable(String),
}
