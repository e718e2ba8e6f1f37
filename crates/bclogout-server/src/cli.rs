//! Command line interface

use std::path::PathBuf;

use clap::Parser;

use crate::config::ServerConfig;
use crate::error::ConfigError;

/// bclogout-server - OpenID Connect Back-Channel Logout endpoint
#[derive(Parser, Debug)]
#[command(
    name = "bclogout-server",
    version,
    about = "Receive OIDC back-channel logout tokens and terminate local sessions"
)]
pub struct Cli {
    /// Configuration file (.toml, .yaml, .yml or .json)
    #[arg(short, long, env = "BCLOGOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Raise the configured log level one step per occurrence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Override the bind address
    #[arg(long)]
    pub bind: Option<String>,

    /// Override the port
    #[arg(long)]
    pub port: Option<u16>,
}

impl Cli {
    /// Load configuration and apply command line overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file or environment is invalid.
    pub fn load_config(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::from_env()?,
        };

        if let Some(bind) = &self.bind {
            config.bind_address.clone_from(bind);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        Ok(config)
    }
}
