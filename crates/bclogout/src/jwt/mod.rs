//! Signature verification for logout tokens
//!
//! Key material comes from the resolved identity provider record:
//!
//! - a PEM-encoded public key in the [`CERTIFICATE`](crate::provider::CERTIFICATE)
//!   property, or
//! - a JWKS endpoint in the [`JWKS_URI`](crate::provider::JWKS_URI) property,
//!   fetched with `reqwest` and cached per endpoint.
//!
//! Only the signature is checked here. Issuer, audience and time claims are
//! left to the validation pipeline.

pub mod jwks;
pub mod verifier;

pub use jwks::{JwksCache, JwksClient};
pub use verifier::{ALLOWED_ALGORITHMS, JwtSignatureVerifier};

use thiserror::Error;

/// Key discovery and decoding failures
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JwtError {
    /// JWKS endpoints must use HTTPS, except on the loopback interface
    #[error("JWKS endpoint must use HTTPS (HTTP only allowed for localhost): {0}")]
    InsecureJwksUri(String),

    /// The HTTP client could not be built
    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),

    /// The JWKS endpoint could not be reached
    #[error("JWKS fetch failed: {0}")]
    Fetch(String),

    /// The JWKS endpoint answered with an error status
    #[error("JWKS endpoint returned status {0}")]
    Status(u16),

    /// The JWKS response is not a key set
    #[error("Invalid JWKS format: {0}")]
    InvalidJwks(String),

    /// No key in the key set matches the token
    #[error("Key ID '{0}' not found in JWKS")]
    KeyNotFound(String),

    /// A key could not be turned into a decoding key
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// The provider has neither a PEM key nor a JWKS endpoint
    #[error("Identity provider '{0}' has no signing key material")]
    NoKeyMaterial(String),

    /// The token could not be decoded for verification
    #[error("Token decoding failed: {0}")]
    Decode(#[from] jsonwebtoken::errors::Error),
}
