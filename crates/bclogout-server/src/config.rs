//! Server configuration management

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use bclogout::memory::{InMemoryIdentityProviders, InMemorySessionStore};
use bclogout::{BackchannelLogoutConfig, IdentityProviderRecord};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Prefix of environment variables overriding file settings
pub const ENV_PREFIX: &str = "BCLOGOUT";

/// Tenant used when the request path carries none
pub const DEFAULT_TENANT: &str = "carbon.super";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind_address: String,
    /// Bind port
    pub port: u16,
    /// Tenant of requests to the unscoped endpoint
    pub default_tenant: String,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Issued-at enforcement
    pub backchannel_logout: BackchannelLogoutConfig,
    /// Static identity provider registry
    pub identity_providers: Vec<TenantProvidersConfig>,
    /// Sessions to seed the in-memory session store with
    pub sessions: Vec<StaticSessionConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

/// Identity providers trusted within one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantProvidersConfig {
    /// Tenant domain
    pub tenant: String,
    /// The tenant's own locally hosted provider
    #[serde(default)]
    pub resident: Option<ResidentProviderConfig>,
    /// Federated providers
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// A federated identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Stable provider id
    pub id: String,
    /// Provider name, also matched against the issuer claim
    pub name: String,
    /// Issuer the provider signs logout tokens as
    #[serde(default)]
    pub issuer: Option<String>,
    /// Client id this deployment is registered under at the provider
    #[serde(default)]
    pub client_id: Option<String>,
    /// JWKS endpoint publishing the provider's signing keys
    #[serde(default)]
    pub jwks_uri: Option<String>,
    /// PEM-encoded signing key, preferred over `jwks_uri`
    #[serde(default)]
    pub certificate: Option<String>,
}

/// The resident provider of a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidentProviderConfig {
    /// Provider id
    #[serde(default = "default_resident_id")]
    pub id: String,
    /// Entity id tokens from the resident provider are issued under
    pub entity_id: String,
    /// Client id of the resident provider's own application
    #[serde(default)]
    pub client_id: Option<String>,
    /// JWKS endpoint of the resident provider
    #[serde(default)]
    pub jwks_uri: Option<String>,
    /// PEM-encoded signing key of the resident provider
    #[serde(default)]
    pub certificate: Option<String>,
}

/// A local session known to the in-memory store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticSessionConfig {
    /// Local user owning the session
    pub user_id: String,
    /// Local session id
    pub session_id: String,
    /// Federated `sid` mapped to this session
    #[serde(default)]
    pub sid: Option<String>,
    /// Federated subject mapped to `user_id`, resolved under `tenant` and `provider_id`
    #[serde(default)]
    pub subject: Option<SubjectMapping>,
}

/// Federated subject of a local user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectMapping {
    /// `sub` claim value
    pub sub: String,
    /// Tenant the mapping belongs to
    pub tenant: String,
    /// Provider the subject was issued by
    pub provider_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            default_tenant: DEFAULT_TENANT.to_string(),
            logging: LoggingConfig::default(),
            backchannel_logout: BackchannelLogoutConfig::default(),
            identity_providers: Vec::new(),
            sessions: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn default_resident_id() -> String {
    "LOCAL".to_string()
}

impl ProviderConfig {
    /// The registry record for this provider
    pub fn to_record(&self) -> IdentityProviderRecord {
        let record = IdentityProviderRecord::new(&self.id, &self.name);
        let record = match &self.issuer {
            Some(issuer) => record.with_issuer(issuer),
            None => record,
        };
        with_key_material(
            record,
            self.client_id.as_deref(),
            self.jwks_uri.as_deref(),
            self.certificate.as_deref(),
        )
    }
}

impl ResidentProviderConfig {
    /// The registry record for this provider
    pub fn to_record(&self) -> IdentityProviderRecord {
        with_key_material(
            IdentityProviderRecord::resident(&self.id, &self.entity_id),
            self.client_id.as_deref(),
            self.jwks_uri.as_deref(),
            self.certificate.as_deref(),
        )
    }
}

fn with_key_material(
    mut record: IdentityProviderRecord,
    client_id: Option<&str>,
    jwks_uri: Option<&str>,
    certificate: Option<&str>,
) -> IdentityProviderRecord {
    if let Some(client_id) = client_id {
        record = record.with_client_id(client_id);
    }
    if let Some(jwks_uri) = jwks_uri {
        record = record.with_jwks_uri(jwks_uri);
    }
    if let Some(certificate) = certificate {
        record = record.with_certificate(certificate);
    }
    record
}

impl ServerConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// The file format is auto-detected from the file extension. Environment
    /// variables with the `BCLOGOUT` prefix override file settings, with `__`
    /// separating nested keys (e.g. `BCLOGOUT__PORT=9000`,
    /// `BCLOGOUT__LOGGING__JSON=true`).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The file contains invalid configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(environment())
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load configuration from the environment alone
    ///
    /// # Errors
    ///
    /// Returns an error if a `BCLOGOUT` variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = config::Config::builder().add_source(environment()).build()?;
        Ok(config.try_deserialize()?)
    }

    /// Create a configuration builder
    ///
    /// # Example
    ///
    /// ```rust
    /// use bclogout_server::ServerConfig;
    ///
    /// let config = ServerConfig::builder()
    ///     .port(9000)
    ///     .default_tenant("example.com")
    ///     .build();
    /// assert_eq!(config.port, 9000);
    /// ```
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// The address to listen on
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `bind_address` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_address, self.port);
        addr.parse()
            .map_err(|_| ConfigError::InvalidBindAddress(addr))
    }

    /// Build the static provider registry
    pub fn provider_registry(&self) -> InMemoryIdentityProviders {
        let registry = InMemoryIdentityProviders::new();
        for tenant in &self.identity_providers {
            if let Some(resident) = &tenant.resident {
                registry.set_resident(&tenant.tenant, resident.to_record());
            }
            for provider in &tenant.providers {
                registry.add_provider(&tenant.tenant, provider.to_record());
            }
        }
        registry
    }

    /// Build the session store, seeded with the configured sessions
    pub fn session_store(&self) -> Arc<InMemorySessionStore> {
        let store = Arc::new(InMemorySessionStore::new());
        for session in &self.sessions {
            store.add_session(&session.user_id, &session.session_id);
            if let Some(sid) = &session.sid {
                store.map_federated_session(sid, &session.session_id);
            }
            if let Some(subject) = &session.subject {
                store.map_subject(
                    &subject.sub,
                    &subject.tenant,
                    &subject.provider_id,
                    &session.user_id,
                );
            }
        }
        store
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

/// Configuration builder
#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    config: ServerConfig,
}

impl ConfigurationBuilder {
    /// Create a builder starting from the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bind address
    pub fn bind_address(mut self, address: impl Into<String>) -> Self {
        self.config.bind_address = address.into();
        self
    }

    /// Set port
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the tenant of unscoped requests
    pub fn default_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.config.default_tenant = tenant.into();
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Emit JSON logs
    pub const fn json_logs(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    /// Set issued-at enforcement
    pub fn backchannel_logout(mut self, config: BackchannelLogoutConfig) -> Self {
        self.config.backchannel_logout = config;
        self
    }

    /// Trust `provider` within `tenant`
    pub fn provider(mut self, tenant: &str, provider: ProviderConfig) -> Self {
        self.tenant_entry(tenant).providers.push(provider);
        self
    }

    /// Set the resident provider of `tenant`
    pub fn resident(mut self, tenant: &str, resident: ResidentProviderConfig) -> Self {
        self.tenant_entry(tenant).resident = Some(resident);
        self
    }

    /// Seed a local session
    pub fn session(mut self, session: StaticSessionConfig) -> Self {
        self.config.sessions.push(session);
        self
    }

    /// Build configuration
    pub fn build(self) -> ServerConfig {
        self.config
    }

    fn tenant_entry(&mut self, tenant: &str) -> &mut TenantProvidersConfig {
        let entries = &mut self.config.identity_providers;
        match entries.iter().position(|t| t.tenant == tenant) {
            Some(index) => &mut entries[index],
            None => {
                entries.push(TenantProvidersConfig {
                    tenant: tenant.to_string(),
                    resident: None,
                    providers: Vec::new(),
                });
                let last = entries.len() - 1;
                &mut entries[last]
            }
        }
    }
}
