//! Error types for back-channel logout processing
//!
//! Failures are split in two tiers:
//! - **Client faults**: the logout token or the request is malformed, or a
//!   mandatory claim check failed. Mapped to `400 Bad Request`; the message may
//!   be echoed back to the identity provider.
//! - **Server faults**: this deployment's own state is at fault (provider
//!   registry, key material, session store). Mapped to `500`; details only go
//!   to the diagnostics channel.
//!
//! Every fault carries a stable code so that diagnostics can be correlated
//! across deployments.

use thiserror::Error;

/// Boxed error returned by collaborators (provider registry, session store, verifier)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for logout operations
pub type LogoutResult<T> = std::result::Result<T, LogoutError>;

/// Faults caused by the logout request or the logout token itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ClientFault {
    /// The `logout_token` request parameter is missing or blank
    LogoutTokenEmpty,
    /// The logout token is not a well-formed signed JWT
    LogoutTokenParsingFailure,
    /// The `iss` claim is missing or blank
    IssuerClaimValidationFailed,
    /// The `aud` claim does not contain the configured client id
    AudienceClaimValidationFailed,
    /// The `iat` claim is missing or outside the validity window
    IssuedAtValidationFailed,
    /// The `events` claim does not carry the back-channel logout event
    EventClaimValidationFailed,
    /// A `nonce` claim is present
    NonceClaimValidationFailed,
    /// Neither `sid` nor `sub` is present
    SubjectClaimNotFound,
}

impl ClientFault {
    /// Stable error code
    pub const fn code(self) -> &'static str {
        match self {
            Self::LogoutTokenEmpty => "OIDC-60001",
            Self::LogoutTokenParsingFailure => "OIDC-60002",
            Self::IssuerClaimValidationFailed => "OIDC-60003",
            Self::AudienceClaimValidationFailed => "OIDC-60004",
            Self::IssuedAtValidationFailed => "OIDC-60005",
            Self::EventClaimValidationFailed => "OIDC-60006",
            Self::NonceClaimValidationFailed => "OIDC-60007",
            Self::SubjectClaimNotFound => "OIDC-60008",
        }
    }

    /// Default human readable message
    pub const fn message(self) -> &'static str {
        match self {
            Self::LogoutTokenEmpty => "Logout token is empty or null",
            Self::LogoutTokenParsingFailure => "Error while parsing the logout token",
            Self::IssuerClaimValidationFailed => "Logout token does not contain a valid iss claim",
            Self::AudienceClaimValidationFailed => {
                "Logout token aud claim does not contain the expected client id"
            }
            Self::IssuedAtValidationFailed => "Logout token iat claim validation failed",
            Self::EventClaimValidationFailed => {
                "Logout token events claim does not contain the back-channel logout event"
            }
            Self::NonceClaimValidationFailed => "Logout token must not contain a nonce claim",
            Self::SubjectClaimNotFound => "Logout token does not contain a sid or sub claim",
        }
    }
}

/// Faults caused by this system's configuration, key material or storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ServerFault {
    /// Signature verification failed or could not be performed
    SignatureValidationFailed,
    /// No identity provider is registered for the token issuer
    NoRegisteredIdpForIssuer,
    /// The identity provider registry failed
    RetrievingIdentityProviderFailed,
    /// The tenant's resident identity provider could not be loaded
    GettingResidentIdpFailed,
    /// The sid to local session mapping could not be read
    RetrievingSessionIdMappingFailed,
    /// The subject could not be mapped to a local user id
    RetrievingUserIdFailed,
    /// Terminating a single session failed
    SessionTerminationFailure,
    /// Terminating the sessions of a user failed
    UserSessionTerminationFailure,
}

impl ServerFault {
    /// Stable error code
    pub const fn code(self) -> &'static str {
        match self {
            Self::SignatureValidationFailed => "OIDC-65001",
            Self::NoRegisteredIdpForIssuer => "OIDC-65002",
            Self::RetrievingIdentityProviderFailed => "OIDC-65003",
            Self::GettingResidentIdpFailed => "OIDC-65004",
            Self::RetrievingSessionIdMappingFailed => "OIDC-65005",
            Self::RetrievingUserIdFailed => "OIDC-65006",
            Self::SessionTerminationFailure => "OIDC-65007",
            Self::UserSessionTerminationFailure => "OIDC-65008",
        }
    }

    /// Default human readable message
    pub const fn message(self) -> &'static str {
        match self {
            Self::SignatureValidationFailed => "Logout token signature validation failed",
            Self::NoRegisteredIdpForIssuer => "No registered identity provider found for issuer",
            Self::RetrievingIdentityProviderFailed => {
                "Error while retrieving the identity provider for the logout token"
            }
            Self::GettingResidentIdpFailed => {
                "Error while retrieving the resident identity provider of tenant"
            }
            Self::RetrievingSessionIdMappingFailed => {
                "Error while retrieving the local session mapped to sid"
            }
            Self::RetrievingUserIdFailed => "Error while retrieving the local user id for sub",
            Self::SessionTerminationFailure => "Error while terminating the session mapped to sid",
            Self::UserSessionTerminationFailure => "Error while terminating the sessions for sub",
        }
    }
}

/// Error raised by any stage of the logout pipeline
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LogoutError {
    /// The request or token is at fault
    #[error("{} - {message}", fault.code())]
    Client {
        /// Fault kind
        fault: ClientFault,
        /// Message safe to return to the caller
        message: String,
    },

    /// This system is at fault
    #[error("{} - {message}", fault.code())]
    Server {
        /// Fault kind
        fault: ServerFault,
        /// Diagnostic message, never returned to the caller
        message: String,
        /// Underlying collaborator error
        #[source]
        source: Option<BoxError>,
    },
}

impl LogoutError {
    /// Create a client fault with its default message
    pub fn client(fault: ClientFault) -> Self {
        Self::Client {
            fault,
            message: fault.message().to_string(),
        }
    }

    /// Create a client fault with a custom message
    pub fn client_with_message(fault: ClientFault, message: impl Into<String>) -> Self {
        Self::Client {
            fault,
            message: message.into(),
        }
    }

    /// Create a server fault with its default message
    pub fn server(fault: ServerFault) -> Self {
        Self::Server {
            fault,
            message: fault.message().to_string(),
            source: None,
        }
    }

    /// Create a server fault naming the claim value or tenant it concerns
    pub fn server_for(fault: ServerFault, data: &str) -> Self {
        Self::Server {
            fault,
            message: format!("{}: {data}", fault.message()),
            source: None,
        }
    }

    /// Attach the collaborator error that caused a server fault
    ///
    /// Client faults are returned unchanged.
    #[must_use]
    pub fn with_source(self, cause: impl Into<BoxError>) -> Self {
        match self {
            Self::Server { fault, message, .. } => Self::Server {
                fault,
                message,
                source: Some(cause.into()),
            },
            client => client,
        }
    }

    /// Whether the request or token is at fault
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::Client { .. })
    }

    /// Stable error code of the fault
    pub fn code(&self) -> &'static str {
        match self {
            Self::Client { fault, .. } => fault.code(),
            Self::Server { fault, .. } => fault.code(),
        }
    }

    /// The fault message
    pub fn message(&self) -> &str {
        match self {
            Self::Client { message, .. } | Self::Server { message, .. } => message,
        }
    }

    /// The client fault kind, if this is a client fault
    pub fn client_fault(&self) -> Option<ClientFault> {
        match self {
            Self::Client { fault, .. } => Some(*fault),
            Self::Server { .. } => None,
        }
    }

    /// The server fault kind, if this is a server fault
    pub fn server_fault(&self) -> Option<ServerFault> {
        match self {
            Self::Server { fault, .. } => Some(*fault),
            Self::Client { .. } => None,
        }
    }
}
