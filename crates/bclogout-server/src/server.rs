//! Server assembly and lifecycle

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use bclogout::memory::InMemorySessionStore;
use bclogout::{Collaborators, JwtSignatureVerifier, LogoutProcessor, TracingDiagnostics};
use tracing::info;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::routes::{AppState, router};

/// Back-channel logout endpoint backed by the static registry
#[derive(Debug)]
pub struct LogoutServer {
    config: ServerConfig,
    sessions: Arc<InMemorySessionStore>,
    router: Router,
}

impl LogoutServer {
    /// Wire the processor and its collaborators from `config`
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Verifier`] if the JWKS HTTP client cannot be built.
    pub fn from_config(config: ServerConfig) -> Result<Self, ServerError> {
        let sessions = config.session_store();
        let processor = LogoutProcessor::new(
            config.backchannel_logout.clone(),
            Collaborators {
                providers: Arc::new(config.provider_registry()),
                verifier: Arc::new(JwtSignatureVerifier::new()?),
                session_ids: sessions.clone(),
                user_ids: sessions.clone(),
                terminator: sessions.clone(),
                diagnostics: Arc::new(TracingDiagnostics),
            },
        );
        let router = router(AppState::new(processor, config.default_tenant.as_str()));

        Ok(Self {
            config,
            sessions,
            router,
        })
    }

    /// Configuration in effect
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The session store the endpoint terminates sessions in
    pub fn sessions(&self) -> &Arc<InMemorySessionStore> {
        &self.sessions
    }

    /// The HTTP router, for embedding or in-process testing
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` completes
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is invalid or the listener fails.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<(), ServerError> {
        let addr = self.config.socket_addr()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!(
            %addr,
            default_tenant = %self.config.default_tenant,
            iat_validation = self.config.backchannel_logout.enable_iat_validation,
            "Back-channel logout endpoint listening"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}
