//! Identity provider records
//!
//! A record is the trust anchor a logout token's issuer resolves to. Records
//! are read-only here; they are owned by whatever registry implements
//! [`IdentityProviderLookup`](crate::traits::IdentityProviderLookup).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::claims::non_blank;

/// Metadata property holding the issuer a provider is known by
pub const IDP_ISSUER_NAME: &str = "idpIssuerName";

/// Authenticator property holding the client id this deployment is registered under
pub const CLIENT_ID: &str = "ClientId";

/// Authenticator property of a resident provider holding its entity id
pub const IDP_ENTITY_ID: &str = "IdPEntityId";

/// Name of the generic, unconfigured provider (compared case-insensitively)
pub const DEFAULT_IDP_NAME: &str = "default";

/// Authenticator property holding the provider's JWKS endpoint
pub const JWKS_URI: &str = "jwksUri";

/// Authenticator property holding the provider's PEM-encoded signing key
pub const CERTIFICATE: &str = "certificate";

/// A registered identity provider
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdentityProviderRecord {
    /// Stable provider id, used when mapping subjects to local users
    pub id: String,
    /// Provider name
    pub name: String,
    /// Metadata properties (e.g. [`IDP_ISSUER_NAME`])
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Properties of the provider's OIDC authenticator
    #[serde(default)]
    pub authenticator_properties: HashMap<String, String>,
    /// Whether this is the tenant's own locally hosted provider
    #[serde(default)]
    pub resident: bool,
}

impl IdentityProviderRecord {
    /// Create a federated provider record
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create a tenant's resident provider with the given entity id
    pub fn resident(id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(id, "LOCAL")
            .with_property(IDP_ENTITY_ID, entity_id)
            .into_resident()
    }

    /// Set the issuer this provider is known by
    pub fn with_issuer(self, issuer: impl Into<String>) -> Self {
        self.with_metadata(IDP_ISSUER_NAME, issuer)
    }

    /// Set a metadata property
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set an authenticator property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.authenticator_properties
            .insert(key.into(), value.into());
        self
    }

    /// Set the expected client id
    pub fn with_client_id(self, client_id: impl Into<String>) -> Self {
        self.with_property(CLIENT_ID, client_id)
    }

    /// Set the JWKS endpoint
    pub fn with_jwks_uri(self, uri: impl Into<String>) -> Self {
        self.with_property(JWKS_URI, uri)
    }

    /// Set the PEM-encoded signing key
    pub fn with_certificate(self, pem: impl Into<String>) -> Self {
        self.with_property(CERTIFICATE, pem)
    }

    /// Mark as the tenant's resident provider
    pub fn into_resident(mut self) -> Self {
        self.resident = true;
        self
    }

    /// A metadata property
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// An authenticator property
    pub fn property(&self, key: &str) -> Option<&str> {
        self.authenticator_properties.get(key).map(String::as_str)
    }

    /// The issuer metadata, if set
    pub fn issuer(&self) -> Option<&str> {
        non_blank(self.metadata(IDP_ISSUER_NAME))
    }

    /// The configured client id; blank counts as unconfigured
    pub fn client_id(&self) -> Option<&str> {
        non_blank(self.property(CLIENT_ID))
    }

    /// The resident entity id
    pub fn entity_id(&self) -> Option<&str> {
        non_blank(self.property(IDP_ENTITY_ID))
    }

    /// The JWKS endpoint
    pub fn jwks_uri(&self) -> Option<&str> {
        non_blank(self.property(JWKS_URI))
    }

    /// The PEM-encoded signing key
    pub fn certificate(&self) -> Option<&str> {
        non_blank(self.property(CERTIFICATE))
    }

    /// Whether this is the generic unconfigured provider
    pub fn is_default_provider(&self) -> bool {
        self.name.eq_ignore_ascii_case(DEFAULT_IDP_NAME)
    }
}
