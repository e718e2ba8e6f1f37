//! Collaborator interfaces consumed by the logout pipeline
//!
//! Every lookup and side effect the pipeline needs is behind one of these
//! traits and handed to [`LogoutProcessor`](crate::LogoutProcessor) at
//! construction. Implementations own their timeout policy; the pipeline never
//! retries a failed call.

use async_trait::async_trait;

use crate::claims::LogoutToken;
use crate::error::BoxError;
use crate::provider::IdentityProviderRecord;

/// Registry of identity providers, partitioned by tenant
#[async_trait]
pub trait IdentityProviderLookup: Send + Sync + std::fmt::Debug {
    /// Find a provider whose metadata `property` equals `value`
    async fn find_by_metadata(
        &self,
        property: &str,
        value: &str,
        tenant: &str,
    ) -> Result<Option<IdentityProviderRecord>, BoxError>;

    /// Find a provider by its name
    async fn find_by_name(
        &self,
        name: &str,
        tenant: &str,
    ) -> Result<Option<IdentityProviderRecord>, BoxError>;

    /// The tenant's resident (locally hosted) provider
    async fn resident_provider(&self, tenant: &str) -> Result<IdentityProviderRecord, BoxError>;
}

/// Verifies a token signature against a provider's key material
#[async_trait]
pub trait SignatureVerifier: Send + Sync + std::fmt::Debug {
    /// `Ok(false)` means the signature does not verify; `Err` means
    /// verification could not be performed at all.
    async fn verify(
        &self,
        token: &LogoutToken,
        provider: &IdentityProviderRecord,
    ) -> Result<bool, BoxError>;
}

/// Maps a federated session id (`sid`) to a local session
#[async_trait]
pub trait SessionIdLookup: Send + Sync + std::fmt::Debug {
    /// The local session id, or `None` when no mapping exists
    async fn local_session_id(&self, sid: &str) -> Result<Option<String>, BoxError>;
}

/// Maps a federated subject to a local user
#[async_trait]
pub trait UserIdLookup: Send + Sync + std::fmt::Debug {
    /// The local user id for `(subject, tenant, provider_id)`
    async fn local_user_id(
        &self,
        subject: &str,
        tenant: &str,
        provider_id: &str,
    ) -> Result<Option<String>, BoxError>;
}

/// Terminates local sessions
#[async_trait]
pub trait SessionTerminator: Send + Sync + std::fmt::Debug {
    /// Terminate one local session
    async fn terminate_session(&self, session_id: &str) -> Result<(), BoxError>;

    /// Terminate every session of a local user
    async fn terminate_user_sessions(&self, user_id: &str) -> Result<(), BoxError>;
}
