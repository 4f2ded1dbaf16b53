use crate::placeholder::PlaceholderRecord;
use crate::read_tracking::{ReadState, ReadTracking};
use crate::types::identity::Aci;
use crate::types::ids::{RowId, SortId, ThreadId, Timestamp, UniqueId};
use serde::{Deserialize, Serialize};

/// Classification of an error-class message in thread history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMessageType {
    NoSession,
    WrongTrustedIdentityKey,
    InvalidKeyException,
    MissingKeyId,
    InvalidMessage,
    DuplicateMessage,
    InvalidVersion,
    NonBlockingIdentityChange,
    UnknownContactBlockOffer,
    GroupCreationFailed,
    SessionRefresh,
    DecryptionFailure,
}

/// Content recovered from a successfully decrypted envelope. The body and
/// attachment ids are carried opaquely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveredContent {
    pub body: Option<String>,
    #[serde(default)]
    pub attachment_ids: Vec<String>,
}

impl RecoveredContent {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            attachment_ids: Vec::new(),
        }
    }
}

/// An ordinary incoming message row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub row_id: RowId,
    pub unique_id: UniqueId,
    pub thread_id: ThreadId,
    pub sort_id: SortId,
    pub sender: Aci,
    pub envelope_timestamp: Timestamp,
    pub received_at: Timestamp,
    pub content: RecoveredContent,
    pub read: ReadState,
}

impl IncomingMessage {
    /// Assigns durable identity to an unsaved message. Called by store
    /// implementations on insert.
    pub fn from_new(new: NewIncomingMessage, row_id: RowId, sort_id: SortId) -> Self {
        Self {
            row_id,
            unique_id: UniqueId::random(),
            thread_id: new.thread_id,
            sort_id,
            sender: new.sender,
            envelope_timestamp: new.envelope_timestamp,
            received_at: new.received_at,
            content: new.content,
            read: ReadState::default(),
        }
    }
}

impl ReadTracking for IncomingMessage {
    fn is_read(&self) -> bool {
        self.read.is_read()
    }

    fn mark_read(&mut self) -> bool {
        self.read.mark_read()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIncomingMessage {
    pub thread_id: ThreadId,
    pub sender: Aci,
    pub envelope_timestamp: Timestamp,
    pub received_at: Timestamp,
    pub content: RecoveredContent,
}

/// A row in thread history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    Incoming(IncomingMessage),
    Placeholder(PlaceholderRecord),
}

impl Interaction {
    pub fn row_id(&self) -> RowId {
        match self {
            Self::Incoming(m) => m.row_id,
            Self::Placeholder(p) => p.row_id(),
        }
    }

    pub fn sort_id(&self) -> SortId {
        match self {
            Self::Incoming(m) => m.sort_id,
            Self::Placeholder(p) => p.sort_id(),
        }
    }

    pub fn thread_id(&self) -> &ThreadId {
        match self {
            Self::Incoming(m) => &m.thread_id,
            Self::Placeholder(p) => p.thread_id(),
        }
    }

    pub fn as_placeholder(&self) -> Option<&PlaceholderRecord> {
        match self {
            Self::Placeholder(p) => Some(p),
            Self::Incoming(_) => None,
        }
    }

    /// Content a thread view would render for this row, if any.
    pub fn content(&self) -> Option<&RecoveredContent> {
        match self {
            Self::Incoming(m) => Some(&m.content),
            Self::Placeholder(p) => p.recovered_content(),
        }
    }
}

impl ReadTracking for Interaction {
    fn is_read(&self) -> bool {
        match self {
            Self::Incoming(m) => m.is_read(),
            Self::Placeholder(p) => p.is_read(),
        }
    }

    fn mark_read(&mut self) -> bool {
        match self {
            Self::Incoming(m) => m.mark_read(),
            Self::Placeholder(p) => p.mark_read(),
        }
    }
}
