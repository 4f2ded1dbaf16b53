//! Minimal single-owner transaction for unit tests. No isolation, no rollback.

use crate::placeholder::{NewPlaceholder, PlaceholderRecord};
use crate::read_tracking::ReadTracking;
use crate::store::error::{Result, StoreError};
use crate::store::traits::{ReadTransaction, WriteTransaction};
use crate::types::{
    Aci, GroupId, IncomingMessage, Interaction, NewIncomingMessage, PhoneNumber,
    PhoneNumberMapping, RowId, SortId, ThreadId, Timestamp,
};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub(crate) struct FakeTransaction {
    pub(crate) rows: Vec<Interaction>,
    contact_threads: HashMap<Aci, ThreadId>,
    group_threads: HashMap<GroupId, ThreadId>,
    phone_numbers: HashMap<PhoneNumber, Aci>,
}

impl FakeTransaction {
    fn next_ids(&self) -> (RowId, SortId) {
        let next = self.rows.len() as u64 + 1;
        (
            RowId::new(next).expect("row ids start at 1"),
            SortId::new(next),
        )
    }

    pub(crate) fn placeholder(&self, row_id: RowId) -> PlaceholderRecord {
        self.rows
            .iter()
            .find(|r| r.row_id() == row_id)
            .and_then(Interaction::as_placeholder)
            .cloned()
            .expect("placeholder row")
    }
}

impl ReadTransaction for FakeTransaction {
    fn group_thread(&self, group_id: &GroupId) -> Result<Option<ThreadId>> {
        Ok(self.group_threads.get(group_id).cloned())
    }

    fn contact_thread(&self, aci: &Aci) -> Result<Option<ThreadId>> {
        Ok(self.contact_threads.get(aci).cloned())
    }

    fn aci_for_phone_number(&self, phone_number: &PhoneNumber) -> Result<Option<Aci>> {
        Ok(self.phone_numbers.get(phone_number).cloned())
    }

    fn placeholders_at(
        &self,
        thread_id: &ThreadId,
        envelope_timestamp: Timestamp,
    ) -> Result<Vec<PlaceholderRecord>> {
        Ok(self
            .rows
            .iter()
            .filter_map(Interaction::as_placeholder)
            .filter(|p| p.thread_id() == thread_id && p.envelope_timestamp() == envelope_timestamp)
            .cloned()
            .collect())
    }

    fn interaction(&self, row_id: RowId) -> Result<Option<Interaction>> {
        Ok(self.rows.iter().find(|r| r.row_id() == row_id).cloned())
    }

    fn interactions_in_thread(&self, thread_id: &ThreadId) -> Result<Vec<Interaction>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.thread_id() == thread_id)
            .cloned()
            .collect())
    }

    fn unread_count(&self, thread_id: &ThreadId) -> Result<usize> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.thread_id() == thread_id && !r.is_read())
            .count())
    }
}

impl WriteTransaction for FakeTransaction {
    fn get_or_create_contact_thread(&mut self, aci: &Aci) -> Result<ThreadId> {
        Ok(self
            .contact_threads
            .entry(aci.clone())
            .or_insert_with(|| ThreadId::new(format!("contact-{aci}")))
            .clone())
    }

    fn create_group_thread(&mut self, group_id: &GroupId) -> Result<ThreadId> {
        Ok(self
            .group_threads
            .entry(group_id.clone())
            .or_insert_with(|| ThreadId::new(format!("group-{group_id}")))
            .clone())
    }

    fn insert_placeholder(&mut self, placeholder: NewPlaceholder) -> Result<PlaceholderRecord> {
        let (row_id, sort_id) = self.next_ids();
        let record = PlaceholderRecord::from_new(placeholder, row_id, sort_id);
        self.rows.push(Interaction::Placeholder(record.clone()));
        Ok(record)
    }

    fn insert_message(&mut self, message: NewIncomingMessage) -> Result<IncomingMessage> {
        let (row_id, sort_id) = self.next_ids();
        let message = IncomingMessage::from_new(message, row_id, sort_id);
        self.rows.push(Interaction::Incoming(message.clone()));
        Ok(message)
    }

    fn update_interaction(&mut self, interaction: &Interaction) -> Result<()> {
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.row_id() == interaction.row_id())
            .ok_or_else(|| StoreError::NotFound(interaction.row_id().to_string()))?;
        *row = interaction.clone();
        Ok(())
    }

    fn put_phone_number_mapping(&mut self, mapping: PhoneNumberMapping) -> Result<()> {
        self.phone_numbers.insert(mapping.phone_number, mapping.aci);
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
