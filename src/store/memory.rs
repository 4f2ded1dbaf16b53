//! In-memory transactional message store.
//!
//! Writers serialize on a single `RwLock` write guard, the same way the
//! SQLite backends serialize writes. A write transaction applies changes
//! directly under its guard and keeps an undo log; dropping it without
//! committing replays the log backwards, so readers never observe a partial
//! transaction.

use crate::store::traits::TransactionalStore;
use async_trait::async_trait;
use log::{debug, warn};
use phcore::placeholder::{NewPlaceholder, PlaceholderRecord};
use phcore::read_tracking::ReadTracking;
use phcore::store::error::{Result, StoreError};
use phcore::store::traits::{ReadTransaction, WriteTransaction};
use phcore::types::{
    Aci, GroupId, IncomingMessage, Interaction, NewIncomingMessage, PhoneNumber,
    PhoneNumberMapping, RowId, SortId, ThreadId, Timestamp,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

#[derive(Debug, Default)]
struct Tables {
    interactions: BTreeMap<RowId, Interaction>,
    contact_threads: HashMap<Aci, ThreadId>,
    group_threads: HashMap<GroupId, ThreadId>,
    phone_numbers: HashMap<PhoneNumber, PhoneNumberMapping>,
    last_row_id: u64,
    last_sort_id: u64,
}

impl Tables {
    fn group_thread(&self, group_id: &GroupId) -> Result<Option<ThreadId>> {
        Ok(self.group_threads.get(group_id).cloned())
    }

    fn contact_thread(&self, aci: &Aci) -> Result<Option<ThreadId>> {
        Ok(self.contact_threads.get(aci).cloned())
    }

    fn aci_for_phone_number(&self, phone_number: &PhoneNumber) -> Result<Option<Aci>> {
        Ok(self.phone_numbers.get(phone_number).map(|m| m.aci.clone()))
    }

    fn placeholders_at(
        &self,
        thread_id: &ThreadId,
        envelope_timestamp: Timestamp,
    ) -> Result<Vec<PlaceholderRecord>> {
        Ok(self
            .interactions
            .values()
            .filter_map(Interaction::as_placeholder)
            .filter(|p| p.thread_id() == thread_id && p.envelope_timestamp() == envelope_timestamp)
            .cloned()
            .collect())
    }

    fn interaction(&self, row_id: RowId) -> Result<Option<Interaction>> {
        Ok(self.interactions.get(&row_id).cloned())
    }

    fn interactions_in_thread(&self, thread_id: &ThreadId) -> Result<Vec<Interaction>> {
        let mut rows: Vec<Interaction> = self
            .interactions
            .values()
            .filter(|i| i.thread_id() == thread_id)
            .cloned()
            .collect();
        rows.sort_by_key(Interaction::sort_id);
        Ok(rows)
    }

    fn unread_count(&self, thread_id: &ThreadId) -> Result<usize> {
        Ok(self
            .interactions
            .values()
            .filter(|i| i.thread_id() == thread_id && !i.is_read())
            .count())
    }

    fn allocate_ids(&mut self) -> Result<(RowId, SortId)> {
        let row_id = self
            .last_row_id
            .checked_add(1)
            .and_then(RowId::new)
            .ok_or_else(|| StoreError::Database("row id space exhausted".to_string()))?;
        let sort_id = self
            .last_sort_id
            .checked_add(1)
            .ok_or_else(|| StoreError::Database("sort id space exhausted".to_string()))?;
        self.last_row_id = row_id.get();
        self.last_sort_id = sort_id;
        Ok((row_id, SortId::new(sort_id)))
    }

    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::Interaction { row_id, previous } => match previous {
                Some(previous) => {
                    self.interactions.insert(row_id, previous);
                }
                None => {
                    self.interactions.remove(&row_id);
                }
            },
            Undo::ContactThread(aci) => {
                self.contact_threads.remove(&aci);
            }
            Undo::GroupThread(group_id) => {
                self.group_threads.remove(&group_id);
            }
            Undo::PhoneNumber {
                phone_number,
                previous,
            } => match previous {
                Some(previous) => {
                    self.phone_numbers.insert(phone_number, previous);
                }
                None => {
                    self.phone_numbers.remove(&phone_number);
                }
            },
        }
    }
}

#[derive(Debug)]
enum Undo {
    Interaction {
        row_id: RowId,
        previous: Option<Interaction>,
    },
    ContactThread(Aci),
    GroupThread(GroupId),
    PhoneNumber {
        phone_number: PhoneNumber,
        previous: Option<PhoneNumberMapping>,
    },
}

macro_rules! impl_read_transaction {
    ($ty:ty) => {
        impl ReadTransaction for $ty {
            fn group_thread(&self, group_id: &GroupId) -> Result<Option<ThreadId>> {
                self.tables.group_thread(group_id)
            }

            fn contact_thread(&self, aci: &Aci) -> Result<Option<ThreadId>> {
                self.tables.contact_thread(aci)
            }

            fn aci_for_phone_number(&self, phone_number: &PhoneNumber) -> Result<Option<Aci>> {
                self.tables.aci_for_phone_number(phone_number)
            }

            fn placeholders_at(
                &self,
                thread_id: &ThreadId,
                envelope_timestamp: Timestamp,
            ) -> Result<Vec<PlaceholderRecord>> {
                self.tables.placeholders_at(thread_id, envelope_timestamp)
            }

            fn interaction(&self, row_id: RowId) -> Result<Option<Interaction>> {
                self.tables.interaction(row_id)
            }

            fn interactions_in_thread(&self, thread_id: &ThreadId) -> Result<Vec<Interaction>> {
                self.tables.interactions_in_thread(thread_id)
            }

            fn unread_count(&self, thread_id: &ThreadId) -> Result<usize> {
                self.tables.unread_count(thread_id)
            }
        }
    };
}

pub struct MemoryReadTransaction {
    tables: OwnedRwLockReadGuard<Tables>,
}

impl_read_transaction!(MemoryReadTransaction);

pub struct MemoryWriteTransaction {
    tables: OwnedRwLockWriteGuard<Tables>,
    undo: Vec<Undo>,
    last_ids_at_begin: (u64, u64),
    committed: bool,
}

impl_read_transaction!(MemoryWriteTransaction);

impl MemoryWriteTransaction {
    fn new(tables: OwnedRwLockWriteGuard<Tables>) -> Self {
        let last_ids_at_begin = (tables.last_row_id, tables.last_sort_id);
        Self {
            tables,
            undo: Vec::new(),
            last_ids_at_begin,
            committed: false,
        }
    }

    fn put_interaction(&mut self, interaction: Interaction) {
        let row_id = interaction.row_id();
        let previous = self.tables.interactions.insert(row_id, interaction);
        self.undo.push(Undo::Interaction { row_id, previous });
    }
}

impl WriteTransaction for MemoryWriteTransaction {
    fn get_or_create_contact_thread(&mut self, aci: &Aci) -> Result<ThreadId> {
        if let Some(thread_id) = self.tables.contact_threads.get(aci) {
            return Ok(thread_id.clone());
        }
        let thread_id = ThreadId::random();
        self.tables
            .contact_threads
            .insert(aci.clone(), thread_id.clone());
        self.undo.push(Undo::ContactThread(aci.clone()));
        debug!("Created contact thread {thread_id} for {aci}");
        Ok(thread_id)
    }

    fn create_group_thread(&mut self, group_id: &GroupId) -> Result<ThreadId> {
        if let Some(thread_id) = self.tables.group_threads.get(group_id) {
            return Ok(thread_id.clone());
        }
        let thread_id = ThreadId::random();
        self.tables
            .group_threads
            .insert(group_id.clone(), thread_id.clone());
        self.undo.push(Undo::GroupThread(group_id.clone()));
        debug!("Created group thread {thread_id} for group {group_id}");
        Ok(thread_id)
    }

    fn insert_placeholder(&mut self, placeholder: NewPlaceholder) -> Result<PlaceholderRecord> {
        let (row_id, sort_id) = self.tables.allocate_ids()?;
        let record = PlaceholderRecord::from_new(placeholder, row_id, sort_id);
        self.put_interaction(Interaction::Placeholder(record.clone()));
        Ok(record)
    }

    fn insert_message(&mut self, message: NewIncomingMessage) -> Result<IncomingMessage> {
        let (row_id, sort_id) = self.tables.allocate_ids()?;
        let message = IncomingMessage::from_new(message, row_id, sort_id);
        self.put_interaction(Interaction::Incoming(message.clone()));
        Ok(message)
    }

    fn update_interaction(&mut self, interaction: &Interaction) -> Result<()> {
        let row_id = interaction.row_id();
        let existing = self
            .tables
            .interactions
            .get(&row_id)
            .ok_or_else(|| StoreError::NotFound(format!("interaction {row_id}")))?;

        let same_kind = matches!(
            (existing, interaction),
            (Interaction::Incoming(_), Interaction::Incoming(_))
                | (Interaction::Placeholder(_), Interaction::Placeholder(_))
        );
        if !same_kind
            || existing.thread_id() != interaction.thread_id()
            || existing.sort_id() != interaction.sort_id()
        {
            return Err(StoreError::Conflict(row_id));
        }

        self.put_interaction(interaction.clone());
        Ok(())
    }

    fn put_phone_number_mapping(&mut self, mapping: PhoneNumberMapping) -> Result<()> {
        let previous = self.tables.phone_numbers.get(&mapping.phone_number).cloned();
        if let Some(existing) = &previous
            && existing.learned_at > mapping.learned_at
        {
            debug!(
                "Ignoring stale mapping for {}: have one learned at {}",
                mapping.phone_number, existing.learned_at
            );
            return Ok(());
        }
        let phone_number = mapping.phone_number.clone();
        self.tables
            .phone_numbers
            .insert(phone_number.clone(), mapping);
        self.undo.push(Undo::PhoneNumber {
            phone_number,
            previous,
        });
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        self.committed = true;
        self.undo.clear();
        Ok(())
    }
}

impl Drop for MemoryWriteTransaction {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let changes = self.undo.len();
        while let Some(undo) = self.undo.pop() {
            self.tables.revert(undo);
        }
        let (last_row_id, last_sort_id) = self.last_ids_at_begin;
        self.tables.last_row_id = last_row_id;
        self.tables.last_sort_id = last_sort_id;
        if changes > 0 {
            warn!("Rolled back uncommitted transaction ({changes} changes)");
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryMessageStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin_write(&self) -> MemoryWriteTransaction {
        MemoryWriteTransaction::new(Arc::clone(&self.tables).write_owned().await)
    }

    pub async fn begin_read(&self) -> MemoryReadTransaction {
        MemoryReadTransaction {
            tables: Arc::clone(&self.tables).read_owned().await,
        }
    }
}

#[async_trait]
impl TransactionalStore for MemoryMessageStore {
    async fn write(&self) -> Box<dyn WriteTransaction + Send> {
        Box::new(self.begin_write().await)
    }

    async fn read(&self) -> Box<dyn ReadTransaction + Send> {
        Box::new(self.begin_read().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phcore::placeholder::policy::GracePeriod;
    use phcore::types::RecoveredContent;

    fn aci(s: &str) -> Aci {
        Aci::parse(s).expect("valid aci")
    }

    fn grace() -> GracePeriod {
        GracePeriod::from_secs(3600).expect("grace")
    }

    fn fake_placeholder(thread_id: ThreadId, sender: Aci, ts: u64) -> NewPlaceholder {
        NewPlaceholder::fake(
            thread_id,
            sender,
            Timestamp::from_millis(ts),
            Timestamp::from_millis(ts + 10),
            grace(),
        )
        .expect("valid fake")
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = MemoryMessageStore::new();
        let alice = aci("alice");

        let mut tx = Box::new(store.begin_write().await);
        let thread = tx.get_or_create_contact_thread(&alice).expect("thread");
        let record = tx
            .insert_placeholder(fake_placeholder(thread.clone(), alice.clone(), 100))
            .expect("insert");
        tx.commit().expect("commit");

        let read = store.begin_read().await;
        assert_eq!(read.contact_thread(&alice).expect("read"), Some(thread.clone()));
        let found = read
            .placeholders_at(&thread, Timestamp::from_millis(100))
            .expect("read");
        assert_eq!(found, vec![record]);
    }

    #[tokio::test]
    async fn test_drop_without_commit_rolls_back() {
        let store = MemoryMessageStore::new();
        let alice = aci("alice");

        let committed_thread = {
            let mut tx = Box::new(store.begin_write().await);
            let thread = tx.get_or_create_contact_thread(&alice).expect("thread");
            tx.insert_placeholder(fake_placeholder(thread.clone(), alice.clone(), 1))
                .expect("insert");
            tx.commit().expect("commit");
            thread
        };

        {
            let mut tx = store.begin_write().await;
            let mut placeholder = tx
                .placeholders_at(&committed_thread, Timestamp::from_millis(1))
                .expect("read")
                .remove(0);
            placeholder.mark_read();
            tx.update_interaction(&Interaction::Placeholder(placeholder))
                .expect("update");
            tx.get_or_create_contact_thread(&aci("bob"))
                .expect("thread");
            tx.insert_placeholder(fake_placeholder(committed_thread.clone(), alice.clone(), 2))
                .expect("insert");
            // dropped here without commit
        }

        let read = store.begin_read().await;
        assert_eq!(read.contact_thread(&aci("bob")).expect("read"), None);
        assert!(
            read.placeholders_at(&committed_thread, Timestamp::from_millis(2))
                .expect("read")
                .is_empty()
        );
        assert_eq!(read.unread_count(&committed_thread).expect("read"), 1);
        drop(read);

        // Ids released by the rolled back insert are handed out again.
        let mut tx = Box::new(store.begin_write().await);
        let record = tx
            .insert_placeholder(fake_placeholder(committed_thread, alice, 3))
            .expect("insert");
        assert_eq!(record.row_id().get(), 2);
        assert_eq!(record.sort_id().get(), 2);
        tx.commit().expect("commit");
    }

    #[tokio::test]
    async fn test_update_rejects_moved_rows() {
        let store = MemoryMessageStore::new();
        let alice = aci("alice");
        let mut tx = Box::new(store.begin_write().await);
        let thread = tx.get_or_create_contact_thread(&alice).expect("thread");
        let message = tx
            .insert_message(NewIncomingMessage {
                thread_id: thread,
                sender: alice.clone(),
                envelope_timestamp: Timestamp::from_millis(5),
                received_at: Timestamp::from_millis(6),
                content: RecoveredContent::text("hi"),
            })
            .expect("insert");

        let mut moved = message.clone();
        moved.thread_id = ThreadId::new("elsewhere");
        assert!(matches!(
            tx.update_interaction(&Interaction::Incoming(moved)),
            Err(StoreError::Conflict(_))
        ));

        let mut missing = message;
        missing.row_id = RowId::new(999).expect("row id");
        assert!(matches!(
            tx.update_interaction(&Interaction::Incoming(missing)),
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_newest_phone_number_mapping_wins() {
        let store = MemoryMessageStore::new();
        let phone = PhoneNumber::parse("+15550001111").expect("phone");
        let mut tx = Box::new(store.begin_write().await);

        tx.put_phone_number_mapping(PhoneNumberMapping {
            phone_number: phone.clone(),
            aci: aci("new"),
            learned_at: Timestamp::from_millis(2_000),
        })
        .expect("put");
        tx.put_phone_number_mapping(PhoneNumberMapping {
            phone_number: phone.clone(),
            aci: aci("old"),
            learned_at: Timestamp::from_millis(1_000),
        })
        .expect("put");

        assert_eq!(tx.aci_for_phone_number(&phone).expect("read"), Some(aci("new")));
        tx.commit().expect("commit");
    }

    #[tokio::test]
    async fn test_interactions_sorted_and_unread_counted() {
        let store = MemoryMessageStore::new();
        let alice = aci("alice");
        let mut tx = Box::new(store.begin_write().await);
        let thread = tx.get_or_create_contact_thread(&alice).expect("thread");
        for ts in [30, 10, 20] {
            tx.insert_placeholder(fake_placeholder(thread.clone(), alice.clone(), ts))
                .expect("insert");
        }
        let rows = tx.interactions_in_thread(&thread).expect("read");
        let sort_ids: Vec<u64> = rows.iter().map(|r| r.sort_id().get()).collect();
        assert_eq!(sort_ids, vec![1, 2, 3]);
        assert_eq!(tx.unread_count(&thread).expect("read"), 3);
        tx.commit().expect("commit");
    }
}
