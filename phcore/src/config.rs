use crate::placeholder::policy::GracePeriod;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("grace period must be greater than zero")]
    ZeroGracePeriod,
}

/// Which sender addresses may be turned into a matching key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderFallback {
    /// Only a stable account identifier resolves a sender.
    StableIdentityOnly,
    /// A sender carrying only a phone number is resolved through the
    /// store's phone number -> identity table.
    PhoneNumber,
}

/// Placeholder protocol configuration.
///
/// Neither field has a default; both must be supplied by the host.
///
/// ```json
/// { "grace_period_secs": 172800, "sender_fallback": "stable_identity_only" }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaceholderConfig {
    #[serde(rename = "grace_period_secs")]
    pub grace_period: GracePeriod,
    pub sender_fallback: SenderFallback,
}

impl PlaceholderConfig {
    pub fn new(grace_period: GracePeriod, sender_fallback: SenderFallback) -> Self {
        Self {
            grace_period,
            sender_fallback,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&raw)?;
        log::debug!(
            "Loaded placeholder config from {}: grace period {:?}, fallback {:?}",
            path.as_ref().display(),
            config.grace_period.as_duration(),
            config.sender_fallback
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_parse_config() {
        let config = PlaceholderConfig::from_json_str(
            r#"{ "grace_period_secs": 172800, "sender_fallback": "phone_number" }"#,
        )
        .expect("config should parse");
        assert_eq!(
            config.grace_period.as_duration(),
            Duration::from_secs(48 * 3600)
        );
        assert_eq!(config.sender_fallback, SenderFallback::PhoneNumber);
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        assert!(PlaceholderConfig::from_json_str(r#"{ "grace_period_secs": 60 }"#).is_err());
        assert!(
            PlaceholderConfig::from_json_str(r#"{ "sender_fallback": "phone_number" }"#).is_err()
        );
    }

    #[test]
    fn test_zero_grace_period_is_rejected() {
        let err = PlaceholderConfig::from_json_str(
            r#"{ "grace_period_secs": 0, "sender_fallback": "stable_identity_only" }"#,
        )
        .expect_err("zero grace period must not parse");
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{ "grace_period_secs": 3600, "sender_fallback": "stable_identity_only" }}"#
        )
        .expect("write config");

        let config = PlaceholderConfig::load(file.path()).expect("config should load");
        assert_eq!(config.grace_period.as_duration(), Duration::from_secs(3600));
        assert_eq!(config.sender_fallback, SenderFallback::StableIdentityOnly);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = PlaceholderConfig::load(dir.path().join("absent.json"))
            .expect_err("missing file must fail");
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
