//! Logout token validation pipeline
//!
//! Stages run strictly in sequence and the first failure wins:
//!
//! 1. claim extraction ([`LogoutToken::parse`])
//! 2. issuer claim presence
//! 3. issuer resolution ([`IssuerResolver`])
//! 4. signature verification against the resolved provider
//! 5. the claim validators in [`CLAIM_VALIDATORS`]: audience, issued-at,
//!    event and nonce
//!
//! Claim validators are pure functions over the claim set, the resolved
//! provider and a [`ValidationContext`], so each can be exercised in
//! isolation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::claims::{BACKCHANNEL_LOGOUT_EVENT, ClaimSet, LogoutToken};
use crate::config::BackchannelLogoutConfig;
use crate::error::{ClientFault, LogoutError, LogoutResult, ServerFault};
use crate::issuer::IssuerResolver;
use crate::provider::IdentityProviderRecord;
use crate::traits::SignatureVerifier;

/// Source of the current time
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Inputs shared by every claim validator of one request
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// Issued-at enforcement settings
    pub config: &'a BackchannelLogoutConfig,
    /// Request time
    pub now: DateTime<Utc>,
}

/// Signature of a claim validator
pub type ClaimCheck =
    fn(&ClaimSet, &IdentityProviderRecord, &ValidationContext<'_>) -> LogoutResult<()>;

/// A named claim check
#[derive(Debug, Clone, Copy)]
pub struct ClaimValidator {
    /// Claim the check is about
    pub name: &'static str,
    /// The check
    pub check: ClaimCheck,
}

/// Claim checks run after the signature has been verified, in order
pub const CLAIM_VALIDATORS: [ClaimValidator; 4] = [
    ClaimValidator {
        name: "aud",
        check: validate_audience,
    },
    ClaimValidator {
        name: "iat",
        check: validate_issued_at,
    },
    ClaimValidator {
        name: "events",
        check: validate_events,
    },
    ClaimValidator {
        name: "nonce",
        check: validate_nonce,
    },
];

/// The issuer claim, which must be present and non-blank
///
/// # Errors
///
/// [`ClientFault::IssuerClaimValidationFailed`] when it is not.
pub fn validate_issuer_claim(claims: &ClaimSet) -> LogoutResult<&str> {
    claims
        .issuer()
        .ok_or_else(|| LogoutError::client(ClientFault::IssuerClaimValidationFailed))
}

/// The audience must contain the provider's client id, when one is configured
///
/// # Errors
///
/// [`ClientFault::AudienceClaimValidationFailed`] naming the expected client id.
pub fn validate_audience(
    claims: &ClaimSet,
    provider: &IdentityProviderRecord,
    _ctx: &ValidationContext<'_>,
) -> LogoutResult<()> {
    let Some(client_id) = provider.client_id() else {
        debug!(provider = %provider.name, "No client id configured, skipping audience check");
        return Ok(());
    };

    if claims.aud.iter().any(|aud| aud == client_id) {
        return Ok(());
    }

    Err(LogoutError::client_with_message(
        ClientFault::AudienceClaimValidationFailed,
        format!(
            "{}: {client_id}",
            ClientFault::AudienceClaimValidationFailed.message()
        ),
    ))
}

/// The issued-at claim must be present and, when enforcement is enabled, no
/// older than the validity period
///
/// A timestamp in the future is accepted.
///
/// # Errors
///
/// [`ClientFault::IssuedAtValidationFailed`].
pub fn validate_issued_at(
    claims: &ClaimSet,
    _provider: &IdentityProviderRecord,
    ctx: &ValidationContext<'_>,
) -> LogoutResult<()> {
    let Some(issued_at) = claims.iat else {
        return Err(LogoutError::client_with_message(
            ClientFault::IssuedAtValidationFailed,
            "Logout token does not contain an iat claim",
        ));
    };

    if !ctx.config.enable_iat_validation {
        return Ok(());
    }

    let age = ctx.now.timestamp().saturating_sub(issued_at);
    let limit = i64::try_from(ctx.config.iat_validity_period.as_secs()).unwrap_or(i64::MAX);
    if age > limit {
        debug!(issued_at, age, limit, "Logout token is too old");
        return Err(LogoutError::client_with_message(
            ClientFault::IssuedAtValidationFailed,
            format!("Logout token was issued {age} seconds ago, the limit is {limit} seconds"),
        ));
    }

    Ok(())
}

/// The events claim must map the back-channel logout event to `{}`
///
/// # Errors
///
/// [`ClientFault::EventClaimValidationFailed`].
pub fn validate_events(
    claims: &ClaimSet,
    _provider: &IdentityProviderRecord,
    _ctx: &ValidationContext<'_>,
) -> LogoutResult<()> {
    let event = claims
        .events
        .as_ref()
        .and_then(Value::as_object)
        .and_then(|events| events.get(BACKCHANNEL_LOGOUT_EVENT));

    match event {
        Some(Value::Object(body)) if body.is_empty() => Ok(()),
        _ => Err(LogoutError::client(ClientFault::EventClaimValidationFailed)),
    }
}

/// A logout token must not carry a nonce
///
/// # Errors
///
/// [`ClientFault::NonceClaimValidationFailed`].
pub fn validate_nonce(
    claims: &ClaimSet,
    _provider: &IdentityProviderRecord,
    _ctx: &ValidationContext<'_>,
) -> LogoutResult<()> {
    if claims.has_nonce() {
        return Err(LogoutError::client(ClientFault::NonceClaimValidationFailed));
    }
    Ok(())
}

/// Run every claim validator in order, stopping at the first failure
///
/// # Errors
///
/// The first validator failure.
pub fn run_claim_validators(
    claims: &ClaimSet,
    provider: &IdentityProviderRecord,
    ctx: &ValidationContext<'_>,
) -> LogoutResult<()> {
    for validator in &CLAIM_VALIDATORS {
        (validator.check)(claims, provider, ctx).inspect_err(|e| {
            debug!(claim = validator.name, code = e.code(), "Claim validation failed");
        })?;
    }
    Ok(())
}

/// A token that passed every check, with the provider it resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedToken {
    /// Verified claims
    pub claims: ClaimSet,
    /// Identity provider that issued the token
    pub provider: IdentityProviderRecord,
}

/// The ordered validation stages
#[derive(Debug, Clone)]
pub struct ValidationPipeline {
    issuers: IssuerResolver,
    verifier: Arc<dyn SignatureVerifier>,
    config: BackchannelLogoutConfig,
    clock: Arc<dyn Clock>,
}

impl ValidationPipeline {
    /// Create a pipeline using the system clock
    pub fn new(
        issuers: IssuerResolver,
        verifier: Arc<dyn SignatureVerifier>,
        config: BackchannelLogoutConfig,
    ) -> Self {
        Self {
            issuers,
            verifier,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration in effect
    pub fn config(&self) -> &BackchannelLogoutConfig {
        &self.config
    }

    /// Validate `token` for `tenant`
    ///
    /// # Errors
    ///
    /// The first failing stage's fault; nothing after it runs.
    pub async fn validate(&self, token: &LogoutToken, tenant: &str) -> LogoutResult<ValidatedToken> {
        let claims = token.parse()?;
        let issuer = validate_issuer_claim(&claims)?;
        let provider = self.issuers.resolve(issuer, tenant).await?;

        self.verify_signature(token, &provider).await?;

        let ctx = ValidationContext {
            config: &self.config,
            now: self.clock.now(),
        };
        run_claim_validators(&claims, &provider, &ctx)?;

        debug!(
            issuer,
            tenant,
            provider = %provider.name,
            "Logout token validated"
        );

        Ok(ValidatedToken { claims, provider })
    }

    async fn verify_signature(
        &self,
        token: &LogoutToken,
        provider: &IdentityProviderRecord,
    ) -> LogoutResult<()> {
        match self.verifier.verify(token, provider).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(provider = %provider.name, "Logout token signature does not verify");
                Err(LogoutError::server(ServerFault::SignatureValidationFailed))
            }
            Err(e) => {
                warn!(provider = %provider.name, error = %e, "Logout token signature could not be verified");
                Err(LogoutError::server(ServerFault::SignatureValidationFailed).with_source(e))
            }
        }
    }
}
