//! Back-channel logout request processing
//!
//! [`LogoutProcessor`] is the entry point: it takes a transport-neutral
//! [`LogoutRequest`], runs the validation pipeline and the session
//! termination, and maps the result to a [`LogoutOutcome`]. All collaborators
//! are injected through [`Collaborators`].

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::claims::{LogoutToken, non_blank};
use crate::config::BackchannelLogoutConfig;
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use crate::error::{ClientFault, LogoutError, LogoutResult};
use crate::issuer::IssuerResolver;
use crate::outcome::LogoutOutcome;
use crate::session::{SessionResolver, Termination};
use crate::traits::{
    IdentityProviderLookup, SessionIdLookup, SessionTerminator, SignatureVerifier, UserIdLookup,
};
use crate::validation::{Clock, ValidationPipeline};

/// Path segment identifying the back-channel logout endpoint
pub const BACKCHANNEL_LOGOUT_PATH: &str = "/identity/oidc/slo";

/// Form parameter carrying the logout token
pub const LOGOUT_TOKEN_PARAM: &str = "logout_token";

/// Whether a request path targets the back-channel logout endpoint
pub fn can_handle(path: &str) -> bool {
    path.contains(BACKCHANNEL_LOGOUT_PATH)
}

/// The tenant a request path is scoped to
///
/// Paths of the form `/t/{tenant}/...` select `tenant`; anything else selects
/// `default_tenant`.
pub fn tenant_from_path(path: &str, default_tenant: &str) -> String {
    path.strip_prefix("/t/")
        .and_then(|rest| rest.split('/').next())
        .filter(|tenant| !tenant.is_empty())
        .unwrap_or(default_tenant)
        .to_string()
}

/// A back-channel logout request
#[derive(Clone, PartialEq, Eq)]
pub struct LogoutRequest {
    /// Value of the `logout_token` parameter
    pub logout_token: Option<String>,
    /// Tenant scope
    pub tenant: String,
}

impl std::fmt::Debug for LogoutRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogoutRequest")
            .field("logout_token", &self.logout_token.as_ref().map(|_| "<redacted>"))
            .field("tenant", &self.tenant)
            .finish()
    }
}

impl LogoutRequest {
    /// Create a request
    pub fn new(logout_token: Option<String>, tenant: impl Into<String>) -> Self {
        Self {
            logout_token,
            tenant: tenant.into(),
        }
    }
}

/// Everything the processor depends on
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Identity provider registry
    pub providers: Arc<dyn IdentityProviderLookup>,
    /// Signature verification
    pub verifier: Arc<dyn SignatureVerifier>,
    /// `sid` to local session mapping
    pub session_ids: Arc<dyn SessionIdLookup>,
    /// `sub` to local user mapping
    pub user_ids: Arc<dyn UserIdLookup>,
    /// Session termination
    pub terminator: Arc<dyn SessionTerminator>,
    /// Diagnostics channel
    pub diagnostics: Arc<dyn DiagnosticsSink>,
}

/// Processes back-channel logout requests
#[derive(Debug, Clone)]
pub struct LogoutProcessor {
    pipeline: ValidationPipeline,
    sessions: SessionResolver,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl LogoutProcessor {
    /// Create a processor
    pub fn new(config: BackchannelLogoutConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            providers,
            verifier,
            session_ids,
            user_ids,
            terminator,
            diagnostics,
        } = collaborators;

        Self {
            pipeline: ValidationPipeline::new(IssuerResolver::new(providers), verifier, config),
            sessions: SessionResolver::new(session_ids, user_ids, terminator),
            diagnostics,
        }
    }

    /// Replace the clock used for issued-at checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.pipeline = self.pipeline.with_clock(clock);
        self
    }

    /// The configuration in effect
    pub fn config(&self) -> &BackchannelLogoutConfig {
        self.pipeline.config()
    }

    /// Process a request into the response to send
    pub async fn process(&self, request: &LogoutRequest) -> LogoutOutcome {
        LogoutOutcome::from_result(&self.handle(request).await)
    }

    /// Process a request, keeping the typed result
    ///
    /// Failures are reported to the diagnostics sink before being returned.
    ///
    /// # Errors
    ///
    /// The first failing stage's fault.
    pub async fn handle(&self, request: &LogoutRequest) -> LogoutResult<Termination> {
        let result = self.run(request).await;

        match &result {
            Ok(termination) => {
                info!(tenant = %request.tenant, ?termination, "Back-channel logout processed");
                self.diagnostics.record(
                    DiagnosticEvent::info("Back-channel logout processed")
                        .with_tenant(&request.tenant),
                );
            }
            Err(e) => self.report(e, &request.tenant),
        }

        result
    }

    async fn run(&self, request: &LogoutRequest) -> LogoutResult<Termination> {
        let Some(token) = non_blank(request.logout_token.as_deref()) else {
            return Err(LogoutError::client(ClientFault::LogoutTokenEmpty));
        };

        let token = LogoutToken::new(token);
        let validated = self.pipeline.validate(&token, &request.tenant).await?;
        self.diagnostics.record(
            DiagnosticEvent::info("Logout token validated").with_tenant(&request.tenant),
        );

        self.sessions.logout(&validated, &request.tenant).await
    }

    fn report(&self, e: &LogoutError, tenant: &str) {
        match e {
            LogoutError::Client { .. } => {
                warn!(tenant, code = e.code(), error = %e, "Rejected back-channel logout request");
            }
            LogoutError::Server { source, .. } => {
                error!(
                    tenant,
                    code = e.code(),
                    error = %e,
                    cause = ?source.as_ref().map(ToString::to_string),
                    "Back-channel logout failed"
                );
            }
        }

        let message = match e {
            LogoutError::Server {
                message,
                source: Some(source),
                ..
            } => format!("{message}: {source}"),
            _ => e.message().to_string(),
        };
        self.diagnostics.record(
            DiagnosticEvent::error(message)
                .with_code(e.code())
                .with_tenant(tenant),
        );
    }
}
