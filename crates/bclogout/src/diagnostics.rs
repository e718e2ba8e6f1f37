//! Diagnostics channel
//!
//! Fault details that must not reach the HTTP response are reported here. A
//! sink is purely observational: recording an event never fails and never
//! changes the outcome of a request.

use serde::Serialize;
use tracing::{error, info};

/// Severity of a diagnostic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    /// Step completed
    Info,
    /// Step failed
    Error,
}

/// A structured diagnostic event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticEvent {
    /// Severity
    pub level: DiagnosticLevel,
    /// What happened
    pub message: String,
    /// Fault code, for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    /// Tenant the request was evaluated under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

impl DiagnosticEvent {
    /// Informational event
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            message: message.into(),
            code: None,
            tenant: None,
        }
    }

    /// Failure event
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            ..Self::info(message)
        }
    }

    /// Attach a fault code
    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach the tenant
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }
}

/// Receives diagnostic events
pub trait DiagnosticsSink: Send + Sync + std::fmt::Debug {
    /// Record an event
    fn record(&self, event: DiagnosticEvent);
}

/// Emits events on the `diagnostics` tracing target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn record(&self, event: DiagnosticEvent) {
        let code = event.code.unwrap_or("-");
        let tenant = event.tenant.as_deref().unwrap_or("-");
        match event.level {
            DiagnosticLevel::Info => {
                info!(target: "diagnostics", code, tenant, "{}", event.message);
            }
            DiagnosticLevel::Error => {
                error!(target: "diagnostics", code, tenant, "{}", event.message);
            }
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiagnostics;

impl DiagnosticsSink for NoopDiagnostics {
    fn record(&self, _event: DiagnosticEvent) {}
}
