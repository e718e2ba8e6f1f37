//! HTTP routes
//!
//! The logout endpoint takes an `application/x-www-form-urlencoded` body
//! carrying `logout_token` and answers in `text/plain` with the status and
//! body of the [`LogoutOutcome`].
//!
//! Any POST whose path contains `/identity/oidc/slo` is a logout request,
//! scoped to the tenant named by a leading `/t/{tenant}` segment.

use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::FormRejection;
use axum::extract::{DefaultBodyLimit, Form, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bclogout::{LogoutOutcome, LogoutProcessor, LogoutRequest, can_handle, tenant_from_path};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Maximum request body size (64KB)
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Every path not claimed by another route
const LOGOUT_ROUTE: &str = "/{*path}";

/// Liveness probe
pub const HEALTH_PATH: &str = "/health";

/// State shared by the handlers
#[derive(Debug, Clone)]
pub struct AppState {
    processor: Arc<LogoutProcessor>,
    default_tenant: Arc<str>,
}

impl AppState {
    /// Create handler state
    pub fn new(processor: LogoutProcessor, default_tenant: impl Into<Arc<str>>) -> Self {
        Self {
            processor: Arc::new(processor),
            default_tenant: default_tenant.into(),
        }
    }

    /// Tenant of requests to the unscoped endpoint
    pub fn default_tenant(&self) -> &str {
        &self.default_tenant
    }
}

/// Form body of a back-channel logout request
#[derive(Debug, Deserialize)]
struct LogoutForm {
    logout_token: Option<String>,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(LOGOUT_ROUTE, post(logout))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn logout(
    State(state): State<AppState>,
    uri: Uri,
    form: Result<Form<LogoutForm>, FormRejection>,
) -> Response {
    let path = uri.path();
    if !can_handle(path) {
        return text(StatusCode::NOT_FOUND, "Not Found");
    }

    // An unreadable body carries no token; the processor reports it as empty.
    let logout_token = match form {
        Ok(Form(form)) => form.logout_token,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            debug!(%rejection, limit = MAX_BODY_SIZE, "Logout request body too large");
            return text(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
        Err(rejection) => {
            debug!(%rejection, "Unreadable logout request body");
            None
        }
    };

    let request = LogoutRequest::new(logout_token, tenant_from_path(path, &state.default_tenant));
    into_response(state.processor.process(&request).await)
}

fn into_response(outcome: LogoutOutcome) -> Response {
    text(outcome.status, outcome.body)
}

fn text(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body.into(),
    )
        .into_response()
}

async fn health() -> &'static str {
    "OK"
}
