//! In-memory collaborators
//!
//! Used by the server's static mode and by tests. All maps are concurrent, so
//! one instance can be shared across request handlers behind an `Arc`.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use crate::error::BoxError;
use crate::provider::IdentityProviderRecord;
use crate::traits::{IdentityProviderLookup, SessionIdLookup, SessionTerminator, UserIdLookup};

#[derive(Debug, Default, Clone)]
struct TenantProviders {
    providers: Vec<IdentityProviderRecord>,
    resident: Option<IdentityProviderRecord>,
}

/// Static identity provider registry
#[derive(Debug, Default)]
pub struct InMemoryIdentityProviders {
    tenants: DashMap<String, TenantProviders>,
}

impl InMemoryIdentityProviders {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for `tenant`
    pub fn add_provider(&self, tenant: &str, provider: IdentityProviderRecord) {
        self.tenants
            .entry(tenant.to_string())
            .or_default()
            .providers
            .push(provider);
    }

    /// Set the resident provider of `tenant`
    pub fn set_resident(&self, tenant: &str, provider: IdentityProviderRecord) {
        self.tenants.entry(tenant.to_string()).or_default().resident = Some(provider.into_resident());
    }

    /// Number of federated providers registered for `tenant`
    pub fn provider_count(&self, tenant: &str) -> usize {
        self.tenants.get(tenant).map_or(0, |t| t.providers.len())
    }

    fn find(
        &self,
        tenant: &str,
        predicate: impl Fn(&IdentityProviderRecord) -> bool,
    ) -> Option<IdentityProviderRecord> {
        self.tenants
            .get(tenant)
            .and_then(|t| t.providers.iter().find(|&p| predicate(p)).cloned())
    }
}

#[async_trait]
impl IdentityProviderLookup for InMemoryIdentityProviders {
    async fn find_by_metadata(
        &self,
        property: &str,
        value: &str,
        tenant: &str,
    ) -> Result<Option<IdentityProviderRecord>, BoxError> {
        Ok(self.find(tenant, |p| p.metadata(property) == Some(value)))
    }

    async fn find_by_name(
        &self,
        name: &str,
        tenant: &str,
    ) -> Result<Option<IdentityProviderRecord>, BoxError> {
        Ok(self.find(tenant, |p| p.name == name))
    }

    async fn resident_provider(&self, tenant: &str) -> Result<IdentityProviderRecord, BoxError> {
        self.tenants
            .get(tenant)
            .and_then(|t| t.resident.clone())
            .ok_or_else(|| format!("no resident identity provider for tenant '{tenant}'").into())
    }
}

/// Session store keeping federated mappings and active sessions
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    // federated sid -> local session id
    federated_sessions: DashMap<String, String>,
    // (sub, tenant, provider id) -> local user id
    subjects: DashMap<(String, String, String), String>,
    // local user id -> active local session ids
    user_sessions: DashMap<String, HashSet<String>>,
}

impl InMemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an active local session of `user_id`
    pub fn add_session(&self, user_id: &str, session_id: &str) {
        self.user_sessions
            .entry(user_id.to_string())
            .or_default()
            .insert(session_id.to_string());
    }

    /// Map a federated `sid` to a local session
    pub fn map_federated_session(&self, sid: &str, session_id: &str) {
        self.federated_sessions
            .insert(sid.to_string(), session_id.to_string());
    }

    /// Map a federated subject to a local user
    pub fn map_subject(&self, sub: &str, tenant: &str, provider_id: &str, user_id: &str) {
        self.subjects.insert(
            (sub.to_string(), tenant.to_string(), provider_id.to_string()),
            user_id.to_string(),
        );
    }

    /// Whether a local session is still active
    pub fn is_active(&self, session_id: &str) -> bool {
        self.user_sessions
            .iter()
            .any(|entry| entry.value().contains(session_id))
    }

    /// Active sessions of a local user
    pub fn sessions_of(&self, user_id: &str) -> Vec<String> {
        let mut sessions: Vec<_> = self
            .user_sessions
            .get(user_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        sessions.sort();
        sessions
    }

    fn forget_federated(&self, session_ids: &HashSet<String>) {
        self.federated_sessions
            .retain(|_, session_id| !session_ids.contains(session_id));
    }
}

#[async_trait]
impl SessionIdLookup for InMemorySessionStore {
    async fn local_session_id(&self, sid: &str) -> Result<Option<String>, BoxError> {
        Ok(self.federated_sessions.get(sid).map(|s| s.value().clone()))
    }
}

#[async_trait]
impl UserIdLookup for InMemorySessionStore {
    async fn local_user_id(
        &self,
        subject: &str,
        tenant: &str,
        provider_id: &str,
    ) -> Result<Option<String>, BoxError> {
        let key = (
            subject.to_string(),
            tenant.to_string(),
            provider_id.to_string(),
        );
        Ok(self.subjects.get(&key).map(|u| u.value().clone()))
    }
}

#[async_trait]
impl SessionTerminator for InMemorySessionStore {
    async fn terminate_session(&self, session_id: &str) -> Result<(), BoxError> {
        for mut entry in self.user_sessions.iter_mut() {
            entry.value_mut().remove(session_id);
        }
        self.user_sessions.retain(|_, sessions| !sessions.is_empty());
        self.forget_federated(&HashSet::from([session_id.to_string()]));
        debug!(session_id, "Session removed from store");
        Ok(())
    }

    async fn terminate_user_sessions(&self, user_id: &str) -> Result<(), BoxError> {
        if let Some((_, sessions)) = self.user_sessions.remove(user_id) {
            debug!(user_id, count = sessions.len(), "User sessions removed from store");
            self.forget_federated(&sessions);
        }
        Ok(())
    }
}

/// Diagnostics sink that keeps every event
#[derive(Debug, Default)]
pub struct InMemoryDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl InMemoryDiagnostics {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().clone()
    }

    /// Codes of the failure events recorded so far
    pub fn error_codes(&self) -> Vec<&'static str> {
        self.events.lock().iter().filter_map(|e| e.code).collect()
    }
}

impl DiagnosticsSink for InMemoryDiagnostics {
    fn record(&self, event: DiagnosticEvent) {
        self.events.lock().push(event);
    }
}
