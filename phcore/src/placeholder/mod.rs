//! Stand-in records for messages that failed to decrypt on receipt.
//!
//! A placeholder keeps enough metadata (sender, envelope timestamp, thread)
//! to be matched against a later successful decryption of the same message.
//! Every way of creating one funnels through [`NewPlaceholder::validated`], so
//! a half-built record is never observable. Durable identity (row id, sort
//! id) is attached by the store on insert via [`PlaceholderRecord::from_new`].

pub mod failed_envelope;
pub mod matcher;
pub mod policy;
pub mod remote_delete;

use crate::placeholder::policy::GracePeriod;
use crate::read_tracking::{ReadState, ReadTracking};
use crate::types::{
    Aci, ErrorMessageType, GroupId, PhoneNumber, RecoveredContent, RowId, ServiceAddress, SortId,
    ThreadId, Timestamp, UniqueId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
    #[error("error message has no thread")]
    EmptyThreadId,

    #[error("placeholder has neither a stable sender identity nor a group id")]
    NoMatchableIdentity,

    #[error("expiration date {expiration} precedes receipt at {received_at}")]
    ExpirationBeforeReceipt {
        received_at: Timestamp,
        expiration: Timestamp,
    },

    #[error("stored row has no row id")]
    MissingRowId,

    #[error("placeholder {0} was already superseded")]
    AlreadySuperseded(RowId),
}

/// How a placeholder should be rendered at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    /// Still eligible for replacement.
    Waiting,
    /// Expired or remotely deleted; stays in history as a generic
    /// "unable to decrypt" entry.
    Tombstone,
    /// Absorbed into the recovered message.
    Recovered,
}

/// Fields shared by every construction path before validation.
#[derive(Debug, Clone)]
struct Draft {
    unique_id: UniqueId,
    thread_id: ThreadId,
    received_at: Timestamp,
    envelope_timestamp: Timestamp,
    sender: ServiceAddress,
    untrusted_group_id: Option<GroupId>,
    recipient: Option<ServiceAddress>,
    was_identity_verified: bool,
    error_type: ErrorMessageType,
    expiration_date: Timestamp,
}

fn validate(draft: &Draft) -> Result<(), PlaceholderError> {
    if draft.thread_id.is_empty() {
        return Err(PlaceholderError::EmptyThreadId);
    }
    if draft.sender.aci.is_none() && draft.untrusted_group_id.is_none() {
        return Err(PlaceholderError::NoMatchableIdentity);
    }
    if draft.expiration_date < draft.received_at {
        return Err(PlaceholderError::ExpirationBeforeReceipt {
            received_at: draft.received_at,
            expiration: draft.expiration_date,
        });
    }
    Ok(())
}

/// Generic error-message builder. The host uses it for every error-class
/// message; a placeholder is one of the variants it can produce.
#[derive(Debug, Clone)]
pub struct ErrorMessageBuilder {
    pub thread_id: ThreadId,
    pub error_type: ErrorMessageType,
    pub timestamp: Timestamp,
    pub received_at: Timestamp,
    pub sender: Option<ServiceAddress>,
    pub recipient: Option<ServiceAddress>,
    pub untrusted_group_id: Option<GroupId>,
    pub was_identity_verified: bool,
}

impl ErrorMessageBuilder {
    pub fn new(
        thread_id: ThreadId,
        error_type: ErrorMessageType,
        timestamp: Timestamp,
        received_at: Timestamp,
    ) -> Self {
        Self {
            thread_id,
            error_type,
            timestamp,
            received_at,
            sender: None,
            recipient: None,
            untrusted_group_id: None,
            was_identity_verified: false,
        }
    }

    pub fn sender(mut self, sender: ServiceAddress) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn recipient(mut self, recipient: ServiceAddress) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn untrusted_group_id(mut self, group_id: GroupId) -> Self {
        self.untrusted_group_id = Some(group_id);
        self
    }

    pub fn identity_verified(mut self, verified: bool) -> Self {
        self.was_identity_verified = verified;
        self
    }
}

/// A validated placeholder that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlaceholder {
    unique_id: UniqueId,
    thread_id: ThreadId,
    received_at: Timestamp,
    envelope_timestamp: Timestamp,
    sender: ServiceAddress,
    untrusted_group_id: Option<GroupId>,
    recipient: Option<ServiceAddress>,
    was_identity_verified: bool,
    error_type: ErrorMessageType,
    expiration_date: Timestamp,
}

impl NewPlaceholder {
    fn validated(draft: Draft) -> Result<Self, PlaceholderError> {
        validate(&draft)?;
        Ok(Self {
            unique_id: draft.unique_id,
            thread_id: draft.thread_id,
            received_at: draft.received_at,
            envelope_timestamp: draft.envelope_timestamp,
            sender: draft.sender,
            untrusted_group_id: draft.untrusted_group_id,
            recipient: draft.recipient,
            was_identity_verified: draft.was_identity_verified,
            error_type: draft.error_type,
            expiration_date: draft.expiration_date,
        })
    }

    /// Placeholder variant of the generic error-message builder. Only the
    /// base error-message rules apply.
    pub fn from_error_builder(
        builder: ErrorMessageBuilder,
        grace_period: GracePeriod,
    ) -> Result<Self, PlaceholderError> {
        Self::validated(Draft {
            unique_id: UniqueId::random(),
            thread_id: builder.thread_id,
            received_at: builder.received_at,
            envelope_timestamp: builder.timestamp,
            sender: builder.sender.unwrap_or_default(),
            untrusted_group_id: builder.untrusted_group_id,
            recipient: builder.recipient,
            was_identity_verified: builder.was_identity_verified,
            error_type: builder.error_type,
            expiration_date: policy::expiration_date(builder.received_at, grace_period),
        })
    }

    pub(crate) fn for_failed_envelope(
        thread_id: ThreadId,
        sender: Aci,
        sender_phone_number: Option<PhoneNumber>,
        envelope_timestamp: Timestamp,
        untrusted_group_id: Option<GroupId>,
        received_at: Timestamp,
        grace_period: GracePeriod,
    ) -> Result<Self, PlaceholderError> {
        Self::validated(Draft {
            unique_id: UniqueId::random(),
            thread_id,
            received_at,
            envelope_timestamp,
            sender: ServiceAddress {
                aci: Some(sender),
                phone_number: sender_phone_number,
            },
            untrusted_group_id,
            recipient: None,
            was_identity_verified: false,
            error_type: ErrorMessageType::DecryptionFailure,
            expiration_date: policy::expiration_date(received_at, grace_period),
        })
    }

    /// Placeholder for tests that need one without going through a failed
    /// envelope. Subject to the same validation as every other factory.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn fake(
        thread_id: ThreadId,
        sender: Aci,
        envelope_timestamp: Timestamp,
        received_at: Timestamp,
        grace_period: GracePeriod,
    ) -> Result<Self, PlaceholderError> {
        Self::validated(Draft {
            unique_id: UniqueId::random(),
            thread_id,
            received_at,
            envelope_timestamp,
            sender: ServiceAddress::from_aci(sender),
            untrusted_group_id: None,
            recipient: None,
            was_identity_verified: false,
            error_type: ErrorMessageType::DecryptionFailure,
            expiration_date: policy::expiration_date(received_at, grace_period),
        })
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    pub fn envelope_timestamp(&self) -> Timestamp {
        self.envelope_timestamp
    }

    pub fn expiration_date(&self) -> Timestamp {
        self.expiration_date
    }
}

/// Persisted row shape of a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPlaceholder {
    pub row_id: u64,
    pub unique_id: String,
    pub thread_id: String,
    pub received_at: Timestamp,
    pub envelope_timestamp: Timestamp,
    pub sort_id: u64,
    pub sender: ServiceAddress,
    pub untrusted_group_id: Option<GroupId>,
    pub recipient: Option<ServiceAddress>,
    pub read: bool,
    pub was_remotely_deleted: bool,
    pub was_identity_verified: bool,
    pub error_type: ErrorMessageType,
    pub superseded: bool,
    pub expiration_date: Timestamp,
    #[serde(default)]
    pub recovered_content: Option<RecoveredContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredPlaceholder", into = "StoredPlaceholder")]
pub struct PlaceholderRecord {
    row_id: RowId,
    unique_id: UniqueId,
    thread_id: ThreadId,
    received_at: Timestamp,
    envelope_timestamp: Timestamp,
    sort_id: SortId,
    sender: ServiceAddress,
    untrusted_group_id: Option<GroupId>,
    recipient: Option<ServiceAddress>,
    read: ReadState,
    was_remotely_deleted: bool,
    was_identity_verified: bool,
    error_type: ErrorMessageType,
    superseded: bool,
    expiration_date: Timestamp,
    recovered_content: Option<RecoveredContent>,
}

impl PlaceholderRecord {
    /// Attaches durable identity to a validated placeholder. Called by store
    /// implementations inside the inserting transaction.
    pub fn from_new(new: NewPlaceholder, row_id: RowId, sort_id: SortId) -> Self {
        Self {
            row_id,
            unique_id: new.unique_id,
            thread_id: new.thread_id,
            received_at: new.received_at,
            envelope_timestamp: new.envelope_timestamp,
            sort_id,
            sender: new.sender,
            untrusted_group_id: new.untrusted_group_id,
            recipient: new.recipient,
            read: ReadState::default(),
            was_remotely_deleted: false,
            was_identity_verified: new.was_identity_verified,
            error_type: new.error_type,
            superseded: false,
            expiration_date: new.expiration_date,
            recovered_content: None,
        }
    }

    /// Rebuilds a record from a persisted row. The stored expiration date is
    /// kept as-is, even if the configured grace period has since changed.
    pub fn rehydrate(stored: StoredPlaceholder) -> Result<Self, PlaceholderError> {
        let row_id = RowId::new(stored.row_id).ok_or(PlaceholderError::MissingRowId)?;
        let new = NewPlaceholder::validated(Draft {
            unique_id: UniqueId::from(stored.unique_id),
            thread_id: ThreadId::new(stored.thread_id),
            received_at: stored.received_at,
            envelope_timestamp: stored.envelope_timestamp,
            sender: stored.sender,
            untrusted_group_id: stored.untrusted_group_id,
            recipient: stored.recipient,
            was_identity_verified: stored.was_identity_verified,
            error_type: stored.error_type,
            expiration_date: stored.expiration_date,
        })?;

        let mut record = Self::from_new(new, row_id, SortId::new(stored.sort_id));
        record.read = ReadState::new(stored.read);
        record.was_remotely_deleted = stored.was_remotely_deleted;
        record.superseded = stored.superseded;
        record.recovered_content = stored.recovered_content;
        Ok(record)
    }

    pub fn to_stored(&self) -> StoredPlaceholder {
        StoredPlaceholder {
            row_id: self.row_id.get(),
            unique_id: self.unique_id.to_string(),
            thread_id: self.thread_id.to_string(),
            received_at: self.received_at,
            envelope_timestamp: self.envelope_timestamp,
            sort_id: self.sort_id.get(),
            sender: self.sender.clone(),
            untrusted_group_id: self.untrusted_group_id.clone(),
            recipient: self.recipient.clone(),
            read: self.read.is_read(),
            was_remotely_deleted: self.was_remotely_deleted,
            was_identity_verified: self.was_identity_verified,
            error_type: self.error_type,
            superseded: self.superseded,
            expiration_date: self.expiration_date,
            recovered_content: self.recovered_content.clone(),
        }
    }

    pub fn row_id(&self) -> RowId {
        self.row_id
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    pub fn received_at(&self) -> Timestamp {
        self.received_at
    }

    pub fn envelope_timestamp(&self) -> Timestamp {
        self.envelope_timestamp
    }

    pub fn sort_id(&self) -> SortId {
        self.sort_id
    }

    pub fn sender(&self) -> &ServiceAddress {
        &self.sender
    }

    pub fn sender_aci(&self) -> Option<&Aci> {
        self.sender.aci.as_ref()
    }

    pub fn untrusted_group_id(&self) -> Option<&GroupId> {
        self.untrusted_group_id.as_ref()
    }

    pub fn recipient(&self) -> Option<&ServiceAddress> {
        self.recipient.as_ref()
    }

    pub fn was_remotely_deleted(&self) -> bool {
        self.was_remotely_deleted
    }

    pub fn was_identity_verified(&self) -> bool {
        self.was_identity_verified
    }

    pub fn error_type(&self) -> ErrorMessageType {
        self.error_type
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded
    }

    /// After this instant the placeholder is no longer eligible for
    /// replacement with the original content.
    pub fn expiration_date(&self) -> Timestamp {
        self.expiration_date
    }

    pub fn recovered_content(&self) -> Option<&RecoveredContent> {
        self.recovered_content.as_ref()
    }

    pub fn supports_replacement(&self, now: Timestamp) -> bool {
        policy::supports_replacement(self, now)
    }

    pub fn display_state(&self, now: Timestamp) -> DisplayState {
        if self.superseded {
            DisplayState::Recovered
        } else if self.supports_replacement(now) {
            DisplayState::Waiting
        } else {
            DisplayState::Tombstone
        }
    }

    pub fn preview_text(&self, now: Timestamp) -> String {
        match self.display_state(now) {
            DisplayState::Waiting => "Waiting for this message".to_string(),
            DisplayState::Tombstone => "Unable to decrypt this message".to_string(),
            DisplayState::Recovered => self
                .recovered_content
                .as_ref()
                .and_then(|c| c.body.clone())
                .unwrap_or_default(),
        }
    }

    /// Replaces the content in place and marks the record superseded in one
    /// step. Sort id and read state are untouched.
    pub(crate) fn supersede_with(
        &mut self,
        content: RecoveredContent,
    ) -> Result<(), PlaceholderError> {
        if self.superseded {
            return Err(PlaceholderError::AlreadySuperseded(self.row_id));
        }
        self.recovered_content = Some(content);
        self.superseded = true;
        Ok(())
    }

    /// Returns `true` if the flag changed.
    pub(crate) fn mark_remotely_deleted(&mut self) -> bool {
        let changed = !self.was_remotely_deleted;
        self.was_remotely_deleted = true;
        changed
    }
}

impl ReadTracking for PlaceholderRecord {
    fn is_read(&self) -> bool {
        self.read.is_read()
    }

    fn mark_read(&mut self) -> bool {
        self.read.mark_read()
    }
}

impl TryFrom<StoredPlaceholder> for PlaceholderRecord {
    type Error = PlaceholderError;

    fn try_from(stored: StoredPlaceholder) -> Result<Self, Self::Error> {
        Self::rehydrate(stored)
    }
}

impl From<PlaceholderRecord> for StoredPlaceholder {
    fn from(record: PlaceholderRecord) -> Self {
        record.to_stored()
    }
}
