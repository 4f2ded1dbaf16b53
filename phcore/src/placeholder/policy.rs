//! Expiration and eligibility.
//!
//! Both are pure functions of the record and a clock reading. Nothing here
//! caches: eligibility is evaluated at the moment it is needed.

use crate::config::ConfigError;
use crate::placeholder::PlaceholderRecord;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long after receipt a placeholder may still be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct GracePeriod(Duration);

impl GracePeriod {
    pub fn new(duration: Duration) -> Result<Self, ConfigError> {
        if duration.is_zero() {
            return Err(ConfigError::ZeroGracePeriod);
        }
        Ok(Self(duration))
    }

    pub fn from_secs(secs: u64) -> Result<Self, ConfigError> {
        Self::new(Duration::from_secs(secs))
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }
}

impl TryFrom<u64> for GracePeriod {
    type Error = ConfigError;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        Self::from_secs(secs)
    }
}

impl From<GracePeriod> for u64 {
    fn from(grace: GracePeriod) -> Self {
        grace.0.as_secs()
    }
}

/// Replacement deadline for a placeholder received at `received_at`.
pub fn expiration_date(received_at: Timestamp, grace_period: GracePeriod) -> Timestamp {
    received_at.saturating_add(grace_period.as_duration())
}

pub fn is_expired(record: &PlaceholderRecord, now: Timestamp) -> bool {
    now > record.expiration_date()
}

/// Whether `record` may still be replaced in place at `now`.
pub fn supports_replacement(record: &PlaceholderRecord, now: Timestamp) -> bool {
    if record.was_remotely_deleted() {
        return false;
    }
    if record.is_superseded() {
        return false;
    }
    !is_expired(record, now)
}
