//! Session resolution and termination
//!
//! The claims of a validated token select one of two branches. A non-blank
//! `sid` always wins and terminates one local session; otherwise a non-blank
//! `sub` terminates every session of the mapped local user.
//!
//! The two branches treat a missing mapping differently. An unknown `sid` is
//! a successful no-op because the session may already be gone, whereas an
//! unknown `sub` is a server fault.

use std::sync::Arc;

use tracing::{debug, info};

use crate::claims::ClaimSet;
use crate::error::{BoxError, ClientFault, LogoutError, LogoutResult, ServerFault};
use crate::provider::IdentityProviderRecord;
use crate::traits::{SessionIdLookup, SessionTerminator, UserIdLookup};
use crate::validation::ValidatedToken;

/// What a token asks to log out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutTarget {
    /// One federated session
    Session {
        /// `sid` claim
        sid: String,
    },
    /// Every session of a subject
    Subject {
        /// `sub` claim
        sub: String,
    },
}

impl LogoutTarget {
    /// Select the target from the claims; `sid` takes precedence
    ///
    /// # Errors
    ///
    /// [`ClientFault::SubjectClaimNotFound`] when neither claim is usable.
    pub fn from_claims(claims: &ClaimSet) -> LogoutResult<Self> {
        if let Some(sid) = claims.session_id() {
            return Ok(Self::Session { sid: sid.to_string() });
        }
        if let Some(sub) = claims.subject() {
            return Ok(Self::Subject { sub: sub.to_string() });
        }
        Err(LogoutError::client(ClientFault::SubjectClaimNotFound))
    }
}

/// A resolved local reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReference {
    /// A local session mapped from a `sid`
    LocalSession {
        /// `sid` claim it was resolved from
        sid: String,
        /// Local session id
        session_id: String,
    },
    /// A local user mapped from a `sub`
    LocalUser {
        /// `sub` claim it was resolved from
        sub: String,
        /// Local user id
        user_id: String,
    },
}

/// What was terminated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// One local session was terminated
    SessionTerminated {
        /// Local session id
        session_id: String,
    },
    /// Every session of a local user was terminated
    UserSessionsTerminated {
        /// Local user id
        user_id: String,
    },
    /// The `sid` maps to no local session; nothing was done
    SessionNotFound {
        /// `sid` claim
        sid: String,
    },
}

/// Resolves a validated token to local sessions and terminates them
#[derive(Debug, Clone)]
pub struct SessionResolver {
    session_ids: Arc<dyn SessionIdLookup>,
    user_ids: Arc<dyn UserIdLookup>,
    terminator: Arc<dyn SessionTerminator>,
}

impl SessionResolver {
    /// Create a resolver
    pub fn new(
        session_ids: Arc<dyn SessionIdLookup>,
        user_ids: Arc<dyn UserIdLookup>,
        terminator: Arc<dyn SessionTerminator>,
    ) -> Self {
        Self {
            session_ids,
            user_ids,
            terminator,
        }
    }

    /// Resolve `target` to a local reference
    ///
    /// Returns `Ok(None)` when a `sid` maps to no local session.
    ///
    /// # Errors
    ///
    /// - [`ServerFault::RetrievingSessionIdMappingFailed`] if the sid lookup fails
    /// - [`ServerFault::RetrievingUserIdFailed`] if the user lookup fails or
    ///   finds nothing
    pub async fn resolve(
        &self,
        target: &LogoutTarget,
        tenant: &str,
        provider: &IdentityProviderRecord,
    ) -> LogoutResult<Option<SessionReference>> {
        match target {
            LogoutTarget::Session { sid } => {
                let session_id = self.session_ids.local_session_id(sid).await.map_err(|e| {
                    LogoutError::server_for(ServerFault::RetrievingSessionIdMappingFailed, sid)
                        .with_source(e)
                })?;

                Ok(session_id.map(|session_id| SessionReference::LocalSession {
                    sid: sid.clone(),
                    session_id,
                }))
            }
            LogoutTarget::Subject { sub } => {
                let user_id = self
                    .user_ids
                    .local_user_id(sub, tenant, &provider.id)
                    .await
                    .map_err(|e| {
                        LogoutError::server_for(ServerFault::RetrievingUserIdFailed, sub)
                            .with_source(e)
                    })?
                    .ok_or_else(|| LogoutError::server_for(ServerFault::RetrievingUserIdFailed, sub))?;

                Ok(Some(SessionReference::LocalUser {
                    sub: sub.clone(),
                    user_id,
                }))
            }
        }
    }

    /// Terminate what `reference` points at
    ///
    /// # Errors
    ///
    /// [`ServerFault::SessionTerminationFailure`] or
    /// [`ServerFault::UserSessionTerminationFailure`], carrying the claim value.
    pub async fn terminate(&self, reference: SessionReference) -> LogoutResult<Termination> {
        match reference {
            SessionReference::LocalSession { sid, session_id } => {
                self.terminator
                    .terminate_session(&session_id)
                    .await
                    .map_err(|e| termination_failed(ServerFault::SessionTerminationFailure, &sid, e))?;
                info!(sid = %sid, session_id = %session_id, "Terminated session");
                Ok(Termination::SessionTerminated { session_id })
            }
            SessionReference::LocalUser { sub, user_id } => {
                self.terminator
                    .terminate_user_sessions(&user_id)
                    .await
                    .map_err(|e| {
                        termination_failed(ServerFault::UserSessionTerminationFailure, &sub, e)
                    })?;
                info!(sub = %sub, user_id = %user_id, "Terminated user sessions");
                Ok(Termination::UserSessionsTerminated { user_id })
            }
        }
    }

    /// Select, resolve and terminate for a validated token
    ///
    /// # Errors
    ///
    /// See [`LogoutTarget::from_claims`], [`Self::resolve`] and [`Self::terminate`].
    pub async fn logout(&self, token: &ValidatedToken, tenant: &str) -> LogoutResult<Termination> {
        let target = LogoutTarget::from_claims(&token.claims)?;

        let reference = self.resolve(&target, tenant, &token.provider).await?;

        match (reference, target) {
            (Some(reference), _) => self.terminate(reference).await,
            (None, LogoutTarget::Session { sid }) => {
                debug!(sid = %sid, "No local session mapped to sid");
                Ok(Termination::SessionNotFound { sid })
            }
            (None, LogoutTarget::Subject { sub }) => Err(LogoutError::server_for(
                ServerFault::RetrievingUserIdFailed,
                &sub,
            )),
        }
    }
}

fn termination_failed(fault: ServerFault, claim: &str, cause: BoxError) -> LogoutError {
    LogoutError::server_for(fault, claim).with_source(cause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: serde_json::Value) -> ClaimSet {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_sid_takes_precedence() {
        let target = LogoutTarget::from_claims(&claims(json!({ "sid": "s-1", "sub": "alice" })));
        assert_eq!(target.unwrap(), LogoutTarget::Session { sid: "s-1".into() });
    }

    #[test]
    fn test_blank_sid_falls_back_to_sub() {
        let target = LogoutTarget::from_claims(&claims(json!({ "sid": " ", "sub": "alice" })));
        assert_eq!(target.unwrap(), LogoutTarget::Subject { sub: "alice".into() });
    }

    #[test]
    fn test_neither_sid_nor_sub() {
        let err = LogoutTarget::from_claims(&claims(json!({ "sid": "", "sub": "  " }))).unwrap_err();
        assert_eq!(err.client_fault(), Some(ClientFault::SubjectClaimNotFound));
    }
}
