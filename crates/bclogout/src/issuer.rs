//! Issuer resolution
//!
//! Maps the (still untrusted) `iss` claim to a registered identity provider.
//! Lookup order:
//!
//! 1. a provider whose [`IDP_ISSUER_NAME`] metadata equals the issuer
//! 2. a provider whose name equals the issuer
//! 3. if the match is the generic `default` provider, the tenant's resident
//!    provider, provided its entity id equals the issuer
//!
//! Registry failures are server faults: they reflect this deployment's
//! configuration, not the token.

use std::sync::Arc;

use tracing::debug;

use crate::error::{BoxError, LogoutError, LogoutResult, ServerFault};
use crate::provider::{IDP_ISSUER_NAME, IdentityProviderRecord};
use crate::traits::IdentityProviderLookup;

/// Resolves token issuers to identity providers
#[derive(Debug, Clone)]
pub struct IssuerResolver {
    providers: Arc<dyn IdentityProviderLookup>,
}

impl IssuerResolver {
    /// Create a resolver over a provider registry
    pub fn new(providers: Arc<dyn IdentityProviderLookup>) -> Self {
        Self { providers }
    }

    /// Resolve `issuer` within `tenant`
    ///
    /// # Errors
    ///
    /// - [`ServerFault::RetrievingIdentityProviderFailed`] if the registry fails
    /// - [`ServerFault::NoRegisteredIdpForIssuer`] if nothing matches, or the
    ///   resident provider's entity id differs from the issuer
    /// - [`ServerFault::GettingResidentIdpFailed`] if the resident provider
    ///   cannot be loaded
    pub async fn resolve(&self, issuer: &str, tenant: &str) -> LogoutResult<IdentityProviderRecord> {
        let provider = match self.find(issuer, tenant).await? {
            Some(provider) => provider,
            None => {
                debug!(issuer, tenant, "No identity provider registered for issuer");
                return Err(LogoutError::server_for(
                    ServerFault::NoRegisteredIdpForIssuer,
                    issuer,
                ));
            }
        };

        if !provider.is_default_provider() {
            debug!(
                issuer,
                tenant,
                provider = %provider.name,
                "Resolved issuer to federated identity provider"
            );
            return Ok(provider);
        }

        self.resolve_resident(issuer, tenant).await
    }

    async fn find(
        &self,
        issuer: &str,
        tenant: &str,
    ) -> LogoutResult<Option<IdentityProviderRecord>> {
        let lookup_failed = |e: BoxError| {
            LogoutError::server_for(ServerFault::RetrievingIdentityProviderFailed, issuer)
                .with_source(e)
        };

        if let Some(provider) = self
            .providers
            .find_by_metadata(IDP_ISSUER_NAME, issuer, tenant)
            .await
            .map_err(lookup_failed)?
        {
            return Ok(Some(provider));
        }

        self.providers
            .find_by_name(issuer, tenant)
            .await
            .map_err(lookup_failed)
    }

    async fn resolve_resident(
        &self,
        issuer: &str,
        tenant: &str,
    ) -> LogoutResult<IdentityProviderRecord> {
        let resident = self.providers.resident_provider(tenant).await.map_err(|e| {
            LogoutError::server_for(ServerFault::GettingResidentIdpFailed, tenant).with_source(e)
        })?;

        if resident.entity_id() != Some(issuer) {
            debug!(
                issuer,
                tenant,
                entity_id = ?resident.entity_id(),
                "Issuer does not match the resident identity provider"
            );
            return Err(LogoutError::server_for(
                ServerFault::NoRegisteredIdpForIssuer,
                issuer,
            ));
        }

        debug!(issuer, tenant, "Resolved issuer to resident identity provider");
        Ok(resident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryIdentityProviders;

    const TENANT: &str = "carbon.super";
    const LOCAL_ISSUER: &str = "https://localhost:9443/oauth2/token";

    fn registry() -> Arc<InMemoryIdentityProviders> {
        let registry = InMemoryIdentityProviders::new();
        registry.add_provider(
            TENANT,
            IdentityProviderRecord::new("idp-1", "Partner").with_issuer("https://partner.example.com"),
        );
        registry.add_provider(TENANT, IdentityProviderRecord::new("idp-2", "https://named.example.com"));
        registry.add_provider(TENANT, IdentityProviderRecord::new("idp-0", "default"));
        registry.set_resident(TENANT, IdentityProviderRecord::resident("local", LOCAL_ISSUER));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_resolves_by_issuer_metadata() {
        let resolver = IssuerResolver::new(registry());
        let idp = resolver
            .resolve("https://partner.example.com", TENANT)
            .await
            .unwrap();
        assert_eq!(idp.id, "idp-1");
    }

    #[tokio::test]
    async fn test_falls_back_to_name() {
        let resolver = IssuerResolver::new(registry());
        let idp = resolver
            .resolve("https://named.example.com", TENANT)
            .await
            .unwrap();
        assert_eq!(idp.id, "idp-2");
    }

    #[tokio::test]
    async fn test_unknown_issuer() {
        let resolver = IssuerResolver::new(registry());
        let err = resolver
            .resolve("https://unknown.example.com", TENANT)
            .await
            .unwrap_err();
        assert_eq!(err.server_fault(), Some(ServerFault::NoRegisteredIdpForIssuer));
    }

    #[tokio::test]
    async fn test_unknown_tenant() {
        let resolver = IssuerResolver::new(registry());
        let err = resolver
            .resolve("https://partner.example.com", "other.com")
            .await
            .unwrap_err();
        assert_eq!(err.server_fault(), Some(ServerFault::NoRegisteredIdpForIssuer));
    }

    #[tokio::test]
    async fn test_default_provider_resolves_to_resident() {
        let registry = registry();
        registry.add_provider(
            TENANT,
            IdentityProviderRecord::new("idp-0b", "Default").with_issuer(LOCAL_ISSUER),
        );
        let resolver = IssuerResolver::new(registry);

        let idp = resolver.resolve(LOCAL_ISSUER, TENANT).await.unwrap();
        assert!(idp.resident);
        assert_eq!(idp.id, "local");
    }

    #[tokio::test]
    async fn test_default_provider_with_mismatched_entity_id() {
        let resolver = IssuerResolver::new(registry());
        let err = resolver.resolve("default", TENANT).await.unwrap_err();
        assert_eq!(err.server_fault(), Some(ServerFault::NoRegisteredIdpForIssuer));
    }

    #[tokio::test]
    async fn test_missing_resident_provider() {
        let registry = InMemoryIdentityProviders::new();
        registry.add_provider(TENANT, IdentityProviderRecord::new("idp-0", "default"));
        let resolver = IssuerResolver::new(Arc::new(registry));

        let err = resolver.resolve("default", TENANT).await.unwrap_err();
        assert_eq!(err.server_fault(), Some(ServerFault::GettingResidentIdpFailed));
    }
}
