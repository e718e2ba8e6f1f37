//! Logout token claim extraction
//!
//! Decodes the claim set of a signed logout token **without** verifying its
//! signature. The issuer claim is needed to find the key material, so the
//! signature is checked later by the validation pipeline once the issuer has
//! been resolved to a registered identity provider. Nothing read here may be
//! trusted before that check succeeds.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::decode_header;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ClientFault, LogoutError, LogoutResult};

/// Key of the back-channel logout event inside the `events` claim
pub const BACKCHANNEL_LOGOUT_EVENT: &str = "http://schemas.openid.net/event/backchannel-logout";

/// A raw signed logout token, opaque until parsed
#[derive(Clone, PartialEq, Eq)]
pub struct LogoutToken(String);

// Tokens are bearer credentials for the duration of their validity window
impl std::fmt::Debug for LogoutToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LogoutToken")
            .field(&format_args!("<{} bytes>", self.0.len()))
            .finish()
    }
}

impl LogoutToken {
    /// Wrap a raw token string
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The compact serialized token
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the claim set
    ///
    /// # Errors
    ///
    /// Returns [`ClientFault::LogoutTokenParsingFailure`] when the token is
    /// not a three-part compact JWS with a supported signing algorithm, or
    /// when its payload is not a JSON claim set of the expected shape.
    pub fn parse(&self) -> LogoutResult<ClaimSet> {
        parse(&self.0)
    }
}

/// Decoded claims of a logout token
///
/// Claims are kept as received; emptiness and blankness checks belong to the
/// validators.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Issuer (iss)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Subject (sub)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience (aud), a single string or an array on the wire
    #[serde(default, deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    /// Issued at (iat), seconds since the Unix epoch
    #[serde(
        default,
        deserialize_with = "deserialize_numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,

    /// Session id (sid) of the federated authentication session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Security events (events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Value>,

    /// Nonce, which a logout token must not carry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Value>,

    /// JWT ID (jti)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Claims not listed above
    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

impl ClaimSet {
    /// The issuer, if present and not blank
    pub fn issuer(&self) -> Option<&str> {
        non_blank(self.iss.as_deref())
    }

    /// The subject, if present and not blank
    pub fn subject(&self) -> Option<&str> {
        non_blank(self.sub.as_deref())
    }

    /// The session id, if present and not blank
    pub fn session_id(&self) -> Option<&str> {
        non_blank(self.sid.as_deref())
    }

    /// Whether a non-blank nonce is present
    ///
    /// Any non-null, non-string nonce value counts as present.
    pub fn has_nonce(&self) -> bool {
        match &self.nonce {
            None | Some(Value::Null) => false,
            Some(Value::String(nonce)) => !nonce.trim().is_empty(),
            Some(_) => true,
        }
    }
}

/// Decode the claims of a compact JWS without verifying its signature
///
/// # Errors
///
/// See [`LogoutToken::parse`].
pub fn parse(token: &str) -> LogoutResult<ClaimSet> {
    // Header first: rejects unsigned ("alg": "none") and unknown algorithms
    let header = decode_header(token).map_err(|e| {
        debug!(error = %e, "Failed to decode logout token header");
        parsing_failure(format!("invalid header: {e}"))
    })?;

    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(parsing_failure("token is not a three-part compact JWS"));
    };

    if signature.is_empty() {
        return Err(parsing_failure("token carries no signature"));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| parsing_failure(format!("invalid payload encoding: {e}")))?;

    let claims: ClaimSet = serde_json::from_slice(&payload)
        .map_err(|e| parsing_failure(format!("invalid claim set: {e}")))?;

    debug!(
        algorithm = ?header.alg,
        key_id = ?header.kid,
        issuer = ?claims.iss,
        "Decoded logout token claims"
    );

    Ok(claims)
}

fn parsing_failure(detail: impl std::fmt::Display) -> LogoutError {
    LogoutError::client_with_message(
        ClientFault::LogoutTokenParsingFailure,
        format!(
            "{}: {detail}",
            ClientFault::LogoutTokenParsingFailure.message()
        ),
    )
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Audience {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Audience>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Audience::One(aud)) => vec![aud],
        Some(Audience::Many(aud)) => aud,
    })
}

// NumericDate may be fractional (RFC 7519 §2)
fn deserialize_numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_json::Number>::deserialize(deserializer)? {
        None => Ok(None),
        Some(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid NumericDate: {n}"))),
    }
}
