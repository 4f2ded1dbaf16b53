//! The transactional surface the placeholder protocol needs from the host's
//! message store.
//!
//! All protocol work happens inside one transaction. Implementations must
//! guarantee that nothing a [`WriteTransaction`] changes is visible to other
//! transactions before [`WriteTransaction::commit`], and that dropping an
//! uncommitted transaction discards every change it made.

use crate::placeholder::{NewPlaceholder, PlaceholderRecord};
use crate::store::error::Result;
use crate::types::{
    Aci, GroupId, IncomingMessage, Interaction, NewIncomingMessage, PhoneNumber,
    PhoneNumberMapping, RowId, ThreadId, Timestamp,
};

pub trait ReadTransaction {
    /// Thread for a group, if the group is known locally.
    fn group_thread(&self, group_id: &GroupId) -> Result<Option<ThreadId>>;

    /// One-to-one thread with `aci`, if it exists.
    fn contact_thread(&self, aci: &Aci) -> Result<Option<ThreadId>>;

    fn aci_for_phone_number(&self, phone_number: &PhoneNumber) -> Result<Option<Aci>>;

    /// Every placeholder in `thread_id` whose original envelope carried
    /// `envelope_timestamp`, regardless of sender.
    fn placeholders_at(
        &self,
        thread_id: &ThreadId,
        envelope_timestamp: Timestamp,
    ) -> Result<Vec<PlaceholderRecord>>;

    fn interaction(&self, row_id: RowId) -> Result<Option<Interaction>>;

    /// Thread history ordered by sort id.
    fn interactions_in_thread(&self, thread_id: &ThreadId) -> Result<Vec<Interaction>>;

    fn unread_count(&self, thread_id: &ThreadId) -> Result<usize>;
}

pub trait WriteTransaction: ReadTransaction {
    fn get_or_create_contact_thread(&mut self, aci: &Aci) -> Result<ThreadId>;

    /// Registers a group thread. Envelope group ids are untrusted, so the
    /// placeholder protocol itself never calls this.
    fn create_group_thread(&mut self, group_id: &GroupId) -> Result<ThreadId>;

    /// Inserts a new row, assigning its row id and sort id.
    fn insert_placeholder(&mut self, placeholder: NewPlaceholder) -> Result<PlaceholderRecord>;

    fn insert_message(&mut self, message: NewIncomingMessage) -> Result<IncomingMessage>;

    /// Overwrites an existing row in place. The row must already exist with
    /// the same kind and thread.
    fn update_interaction(&mut self, interaction: &Interaction) -> Result<()>;

    fn put_phone_number_mapping(&mut self, mapping: PhoneNumberMapping) -> Result<()>;

    fn commit(self: Box<Self>) -> Result<()>;
}
