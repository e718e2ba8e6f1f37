//! `SignatureVerifier` backed by `jsonwebtoken`

use std::collections::HashSet;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation, decode, decode_header};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::{JwksCache, JwtError};
use crate::claims::LogoutToken;
use crate::error::BoxError;
use crate::provider::IdentityProviderRecord;
use crate::traits::SignatureVerifier;

/// Asymmetric algorithms accepted for logout tokens
pub const ALLOWED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Verifies logout token signatures with the resolved provider's key material
///
/// A PEM key in the provider record takes precedence over its JWKS endpoint.
#[derive(Debug, Clone)]
pub struct JwtSignatureVerifier {
    jwks: JwksCache,
}

impl JwtSignatureVerifier {
    /// Create a verifier with its own JWKS cache
    ///
    /// # Errors
    ///
    /// [`JwtError::HttpClient`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, JwtError> {
        Ok(Self::with_jwks_cache(JwksCache::new()?))
    }

    /// Create a verifier sharing an existing JWKS cache
    pub fn with_jwks_cache(jwks: JwksCache) -> Self {
        Self { jwks }
    }

    /// The JWKS cache in use
    pub fn jwks_cache(&self) -> &JwksCache {
        &self.jwks
    }

    async fn decoding_key(
        &self,
        header: &Header,
        provider: &IdentityProviderRecord,
    ) -> Result<DecodingKey, JwtError> {
        if let Some(pem) = provider.certificate() {
            return pem_decoding_key(pem, header.alg);
        }

        let Some(jwks_uri) = provider.jwks_uri() else {
            error!(provider = %provider.name, "No signing key material configured");
            return Err(JwtError::NoKeyMaterial(provider.name.clone()));
        };

        let client = self.jwks.client(jwks_uri);
        let jwks = client.get_jwks().await?;
        if let Some(jwk) = select_jwk(&jwks, header.kid.as_deref()) {
            return jwk_decoding_key(jwk);
        }

        // The provider may have rotated its keys since the last fetch
        debug!(key_id = ?header.kid, jwks_uri, "Key not in cached JWKS, refreshing");
        let jwks = client.refresh().await?;
        let jwk = select_jwk(&jwks, header.kid.as_deref()).ok_or_else(|| {
            error!(key_id = ?header.kid, jwks_uri, "Key ID not found in JWKS");
            JwtError::KeyNotFound(header.kid.clone().unwrap_or_default())
        })?;
        jwk_decoding_key(jwk)
    }
}

#[async_trait]
impl SignatureVerifier for JwtSignatureVerifier {
    async fn verify(
        &self,
        token: &LogoutToken,
        provider: &IdentityProviderRecord,
    ) -> Result<bool, BoxError> {
        let header = decode_header(token.as_str()).map_err(JwtError::from)?;

        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            warn!(algorithm = ?header.alg, "Logout token algorithm not in allowlist");
            return Ok(false);
        }

        let key = self.decoding_key(&header, provider).await?;

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        match decode::<Value>(token.as_str(), &key, &validation) {
            Ok(_) => {
                debug!(provider = %provider.name, algorithm = ?header.alg, "Signature verified");
                Ok(true)
            }
            Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm) => {
                debug!(provider = %provider.name, error = %e, "Signature does not verify");
                Ok(false)
            }
            Err(e) => Err(JwtError::Decode(e).into()),
        }
    }
}

fn pem_decoding_key(pem: &str, algorithm: Algorithm) -> Result<DecodingKey, JwtError> {
    let key = match algorithm {
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem.as_bytes()),
        _ => DecodingKey::from_rsa_pem(pem.as_bytes()),
    };
    key.map_err(|e| {
        error!(algorithm = ?algorithm, error = %e, "Failed to load PEM signing key");
        JwtError::InvalidKey(e.to_string())
    })
}

fn jwk_decoding_key(jwk: &Jwk) -> Result<DecodingKey, JwtError> {
    DecodingKey::from_jwk(jwk).map_err(|e| {
        error!(key_id = ?jwk.common.key_id, error = %e, "Failed to create decoding key from JWK");
        JwtError::InvalidKey(e.to_string())
    })
}

/// The key matching `kid`, or the only key when the token names none
fn select_jwk<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => jwks.find(kid),
        None if jwks.keys.len() == 1 => jwks.keys.first(),
        None => None,
    }
}
