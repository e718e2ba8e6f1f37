//! # bclogout-server
//!
//! HTTP endpoint for [`bclogout`]: receives back-channel logout tokens on
//! any `POST` path containing `/identity/oidc/slo` (scoped to a tenant by a
//! leading `/t/{tenant}`), and terminates sessions in an in-memory store
//! seeded from configuration.
//!
//! ```rust,no_run
//! use bclogout_server::{LogoutServer, ServerConfig};
//!
//! # async fn run() -> Result<(), bclogout_server::ServerError> {
//! let config = ServerConfig::from_file("bclogout.toml")?;
//! config.logging.init(0)?;
//!
//! LogoutServer::from_config(config)?
//!     .serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod server;

pub use cli::Cli;
pub use config::{
    ConfigurationBuilder, LoggingConfig, ProviderConfig, ResidentProviderConfig, ServerConfig,
    StaticSessionConfig, SubjectMapping, TenantProvidersConfig,
};
pub use error::{ConfigError, ServerError};
pub use routes::{AppState, router};
pub use server::LogoutServer;
