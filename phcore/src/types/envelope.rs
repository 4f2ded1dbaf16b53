use crate::types::identity::{GroupId, ServiceAddress};
use crate::types::ids::Timestamp;
use crate::types::message::RecoveredContent;

/// Metadata left over from an envelope that could not be decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEnvelope {
    pub timestamp: Timestamp,
    pub sender: ServiceAddress,
    pub untrusted_group_id: Option<GroupId>,
}

/// A successfully decrypted envelope handed over by the receipt pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredEnvelope {
    pub sender: ServiceAddress,
    pub timestamp: Timestamp,
    pub untrusted_group_id: Option<GroupId>,
    pub content: RecoveredContent,
}
