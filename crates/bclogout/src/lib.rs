//! # bclogout - OIDC Back-Channel Logout receiver
//!
//! Receiving side of OpenID Connect Back-Channel Logout 1.0: accepts a signed
//! logout token pushed by an identity provider, validates it, and terminates
//! the local session(s) it refers to.
//!
//! ## Pipeline
//!
//! ```text
//! LogoutRequest
//!   -> claim extraction       (claims)
//!   -> issuer resolution      (issuer)
//!   -> signature + claims     (validation)
//!   -> session termination    (session)
//!   -> LogoutOutcome          (outcome)
//! ```
//!
//! Each stage either hands its output to the next or aborts with a
//! [`LogoutError`], which is a client fault (`400`) or a server fault (`500`).
//!
//! ## Collaborators
//!
//! The pipeline never reaches into global state. Provider registry, signature
//! verification, session lookups, termination and diagnostics are injected
//! through [`Collaborators`]; see [`traits`] for the interfaces and [`memory`]
//! for in-memory implementations.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bclogout::{
//!     BackchannelLogoutConfig, Collaborators, LogoutProcessor, LogoutRequest,
//!     JwtSignatureVerifier, TracingDiagnostics,
//!     memory::{InMemoryIdentityProviders, InMemorySessionStore},
//! };
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(InMemorySessionStore::new());
//! let processor = LogoutProcessor::new(
//!     BackchannelLogoutConfig::default(),
//!     Collaborators {
//!         providers: Arc::new(InMemoryIdentityProviders::new()),
//!         verifier: Arc::new(JwtSignatureVerifier::new()?),
//!         session_ids: store.clone(),
//!         user_ids: store.clone(),
//!         terminator: store,
//!         diagnostics: Arc::new(TracingDiagnostics),
//!     },
//! );
//!
//! let outcome = processor
//!     .process(&LogoutRequest::new(None, "carbon.super"))
//!     .await;
//! assert_eq!(outcome.status, 400);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod claims;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod issuer;
pub mod jwt;
pub mod memory;
pub mod outcome;
pub mod processor;
pub mod provider;
pub mod session;
pub mod traits;
pub mod validation;

pub use claims::{BACKCHANNEL_LOGOUT_EVENT, ClaimSet, LogoutToken};
pub use config::{BackchannelLogoutConfig, DEFAULT_IAT_VALIDITY_PERIOD};
pub use diagnostics::{
    DiagnosticEvent, DiagnosticLevel, DiagnosticsSink, NoopDiagnostics, TracingDiagnostics,
};
pub use error::{BoxError, ClientFault, LogoutError, LogoutResult, ServerFault};
pub use issuer::IssuerResolver;
pub use jwt::{JwksCache, JwksClient, JwtError, JwtSignatureVerifier};
pub use outcome::{GENERIC_SERVER_ERROR, LOGOUT_SUCCESS, LogoutOutcome};
pub use processor::{
    BACKCHANNEL_LOGOUT_PATH, Collaborators, LOGOUT_TOKEN_PARAM, LogoutProcessor, LogoutRequest,
    can_handle, tenant_from_path,
};
pub use provider::IdentityProviderRecord;
pub use session::{LogoutTarget, SessionReference, SessionResolver, Termination};
pub use traits::{
    IdentityProviderLookup, SessionIdLookup, SessionTerminator, SignatureVerifier, UserIdLookup,
};
pub use validation::{
    CLAIM_VALIDATORS, ClaimValidator, Clock, FixedClock, SystemClock, ValidatedToken,
    ValidationContext, ValidationPipeline,
};
