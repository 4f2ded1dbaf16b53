use crate::types::ids::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable account identifier. Unlike a phone number it never changes for the
/// lifetime of the account, which is what makes it usable as a matching key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aci(String);

impl Aci {
    /// Returns `None` for an empty or blank identifier.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_ascii_lowercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Aci {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// E.164 phone number, e.g. `+15551234567`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(s: &str) -> Option<Self> {
        let digits = s.strip_prefix('+')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Group identifier as carried in an envelope. Envelope-derived ids are
/// untrusted until group membership has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(Vec<u8>);

impl GroupId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// Address of an account as seen on the wire: either half may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceAddress {
    pub aci: Option<Aci>,
    pub phone_number: Option<PhoneNumber>,
}

impl ServiceAddress {
    pub fn from_aci(aci: Aci) -> Self {
        Self {
            aci: Some(aci),
            phone_number: None,
        }
    }

    pub fn from_phone_number(phone_number: PhoneNumber) -> Self {
        Self {
            aci: None,
            phone_number: Some(phone_number),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.aci.is_none() && self.phone_number.is_none()
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.aci, &self.phone_number) {
            (Some(aci), _) => write!(f, "{aci}"),
            (None, Some(pn)) => write!(f, "{pn}"),
            (None, None) => f.write_str("<unknown>"),
        }
    }
}

/// A learned phone number -> stable identity mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumberMapping {
    pub phone_number: PhoneNumber,
    pub aci: Aci,
    /// When the mapping was learned; the most recent mapping for a phone
    /// number wins.
    pub learned_at: Timestamp,
}
