//! Startup errors

use std::path::PathBuf;

use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Bind address and port do not form a socket address
    #[error("Invalid bind address '{0}'")]
    InvalidBindAddress(String),
}

/// Errors that stop the server from starting or serving
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Key discovery client could not be built
    #[error("Failed to initialise signature verification: {0}")]
    Verifier(#[from] bclogout::JwtError),

    /// Tracing subscriber could not be installed
    #[error("Failed to initialise logging: {0}")]
    Logging(String),

    /// Socket or serve failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
