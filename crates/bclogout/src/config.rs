//! Back-channel logout configuration
//!
//! Built once at startup. Raw values are validated eagerly: an unset or
//! malformed validity period falls back to [`DEFAULT_IAT_VALIDITY_PERIOD`]
//! with a warning, so request handling never re-parses configuration.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

/// Validity window applied to `iat` when none is configured
pub const DEFAULT_IAT_VALIDITY_PERIOD: Duration = Duration::from_secs(15_000);

/// Issued-at enforcement settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackchannelLogoutConfig {
    /// Reject tokens whose `iat` is older than the validity period
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub enable_iat_validation: bool,

    /// Maximum age of a token, in seconds on the wire
    #[serde(
        default = "default_validity_period",
        deserialize_with = "deserialize_validity_period",
        serialize_with = "serialize_seconds"
    )]
    pub iat_validity_period: Duration,
}

impl Default for BackchannelLogoutConfig {
    fn default() -> Self {
        Self {
            enable_iat_validation: false,
            iat_validity_period: DEFAULT_IAT_VALIDITY_PERIOD,
        }
    }
}

impl BackchannelLogoutConfig {
    /// Build from raw string properties
    ///
    /// The flag is enabled only by a case-insensitive `"true"`. The period is
    /// a whole number of seconds; anything else selects the default.
    pub fn from_raw(enable_iat_validation: Option<&str>, iat_validity_period: Option<&str>) -> Self {
        Self {
            enable_iat_validation: parse_flag(enable_iat_validation),
            iat_validity_period: parse_validity_period(iat_validity_period),
        }
    }

    /// Enable or disable issued-at enforcement
    pub fn with_iat_validation(mut self, enabled: bool) -> Self {
        self.enable_iat_validation = enabled;
        self
    }

    /// Set the validity period
    pub fn with_iat_validity_period(mut self, period: Duration) -> Self {
        self.iat_validity_period = period;
        self
    }
}

fn default_validity_period() -> Duration {
    DEFAULT_IAT_VALIDITY_PERIOD
}

fn parse_flag(raw: Option<&str>) -> bool {
    raw.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

fn parse_validity_period(raw: Option<&str>) -> Duration {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return DEFAULT_IAT_VALIDITY_PERIOD;
    };

    match raw.parse::<u64>() {
        Ok(seconds) => Duration::from_secs(seconds),
        Err(e) => {
            warn!(
                value = raw,
                error = %e,
                default_secs = DEFAULT_IAT_VALIDITY_PERIOD.as_secs(),
                "Invalid iat validity period, using default"
            );
            DEFAULT_IAT_VALIDITY_PERIOD
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawValue>::deserialize(deserializer)? {
        Some(RawValue::Bool(flag)) => flag,
        Some(RawValue::Text(text)) => parse_flag(Some(&text)),
        _ => false,
    })
}

fn deserialize_validity_period<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawValue>::deserialize(deserializer)? {
        None => DEFAULT_IAT_VALIDITY_PERIOD,
        Some(RawValue::Unsigned(seconds)) => Duration::from_secs(seconds),
        Some(RawValue::Text(text)) => parse_validity_period(Some(&text)),
        Some(RawValue::Signed(seconds)) => parse_validity_period(Some(&seconds.to_string())),
        Some(RawValue::Float(seconds)) => parse_validity_period(Some(&seconds.to_string())),
        Some(RawValue::Bool(flag)) => parse_validity_period(Some(&flag.to_string())),
    })
}

fn serialize_seconds<S>(period: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(period.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = BackchannelLogoutConfig::default();
        assert!(!config.enable_iat_validation);
        assert_eq!(config.iat_validity_period, Duration::from_secs(15_000));
    }

    #[test]
    fn test_from_raw() {
        let config = BackchannelLogoutConfig::from_raw(Some("TRUE"), Some(" 300 "));
        assert!(config.enable_iat_validation);
        assert_eq!(config.iat_validity_period, Duration::from_secs(300));
    }

    #[test]
    fn test_from_raw_falls_back_on_malformed_values() {
        for period in [None, Some(""), Some("abc"), Some("-5"), Some("1.5")] {
            let config = BackchannelLogoutConfig::from_raw(Some("yes"), period);
            assert!(!config.enable_iat_validation);
            assert_eq!(
                config.iat_validity_period, DEFAULT_IAT_VALIDITY_PERIOD,
                "period {period:?}"
            );
        }
    }

    #[test]
    fn test_deserialize_numbers_and_strings() {
        let config: BackchannelLogoutConfig = serde_json::from_value(json!({
            "enable_iat_validation": "true",
            "iat_validity_period": "120"
        }))
        .unwrap();
        assert!(config.enable_iat_validation);
        assert_eq!(config.iat_validity_period, Duration::from_secs(120));

        let config: BackchannelLogoutConfig = serde_json::from_value(json!({
            "enable_iat_validation": true,
            "iat_validity_period": 60
        }))
        .unwrap();
        assert!(config.enable_iat_validation);
        assert_eq!(config.iat_validity_period, Duration::from_secs(60));
    }

    #[test]
    fn test_deserialize_lenient_fallback() {
        let config: BackchannelLogoutConfig = serde_json::from_value(json!({
            "iat_validity_period": -10
        }))
        .unwrap();
        assert_eq!(config.iat_validity_period, DEFAULT_IAT_VALIDITY_PERIOD);

        let config: BackchannelLogoutConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, BackchannelLogoutConfig::default());
    }

    #[test]
    fn test_serializes_period_as_seconds() {
        let config = BackchannelLogoutConfig::default()
            .with_iat_validation(true)
            .with_iat_validity_period(Duration::from_secs(42));
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({ "enable_iat_validation": true, "iat_validity_period": 42 })
        );
    }
}
