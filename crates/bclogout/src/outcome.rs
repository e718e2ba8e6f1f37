//! Mapping of pipeline results to HTTP responses

use http::StatusCode;
use serde::Serialize;

use crate::error::{LogoutError, LogoutResult};
use crate::session::Termination;

/// Body returned when sessions were terminated
pub const LOGOUT_SUCCESS: &str = "LOGOUT SUCCESS";

/// Body returned for every server fault
pub const GENERIC_SERVER_ERROR: &str = "Error occurred while processing the logout request.";

/// Status and plain-text body returned to the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoutOutcome {
    /// HTTP status
    #[serde(with = "status_code")]
    pub status: StatusCode,
    /// Plain-text body
    pub body: String,
}

impl LogoutOutcome {
    /// Map a pipeline result
    pub fn from_result(result: &LogoutResult<Termination>) -> Self {
        match result {
            Ok(termination) => Self::from_termination(termination),
            Err(e) => Self::from_error(e),
        }
    }

    /// Successful outcome; an unknown `sid` yields an empty body
    pub fn from_termination(termination: &Termination) -> Self {
        let body = match termination {
            Termination::SessionNotFound { .. } => String::new(),
            Termination::SessionTerminated { .. } | Termination::UserSessionsTerminated { .. } => {
                LOGOUT_SUCCESS.to_string()
            }
        };
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    /// Failed outcome; server fault details are never included
    pub fn from_error(error: &LogoutError) -> Self {
        if error.is_client_fault() {
            Self {
                status: StatusCode::BAD_REQUEST,
                body: error.message().to_string(),
            }
        } else {
            Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: GENERIC_SERVER_ERROR.to_string(),
            }
        }
    }

    /// Whether the request succeeded
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

mod status_code {
    use http::StatusCode;
    use serde::Serializer;

    pub(super) fn serialize<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(status.as_u16())
    }
}
