//! Entry points for the decryption and message-receipt pipelines.
//!
//! Each call opens its own write transaction, runs the placeholder protocol
//! against it and commits. The two pipelines may call in concurrently; the
//! store serializes their transactions.

use crate::clock::Clock;
use crate::error::ProcessorError;
use crate::store::StoreError;
use crate::store::traits::TransactionalStore;
use crate::types::events::{
    EventBus, InvariantFailure, MessageInserted, PlaceholderCreated, PlaceholderDeleted,
    PlaceholderReplaced, UndecryptableMessage, publish,
};
use log::debug;
use phcore::config::PlaceholderConfig;
use phcore::invariant::InvariantViolation;
use phcore::placeholder::PlaceholderRecord;
use phcore::placeholder::failed_envelope::{FailureOutcome, create_for_failed_envelope};
use phcore::placeholder::matcher::{ReplacementOutcome, replace_or_insert};
use phcore::placeholder::remote_delete::apply_remote_delete;
use phcore::read_tracking::ReadTracking;
use phcore::types::{
    FailedEnvelope, GroupId, Interaction, RecoveredEnvelope, RowId, ServiceAddress, SortId,
    ThreadId, Timestamp,
};
use std::sync::Arc;

pub struct MessageProcessor {
    store: Arc<dyn TransactionalStore>,
    config: PlaceholderConfig,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
}

impl MessageProcessor {
    pub fn new(
        store: Arc<dyn TransactionalStore>,
        config: PlaceholderConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            event_bus: Arc::new(EventBus::new()),
        }
    }

    pub fn config(&self) -> &PlaceholderConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Called by the decryption pipeline when an envelope cannot be
    /// decrypted. Returns the placeholder standing in for it, or `None` if the
    /// sender could not be resolved; in that case an
    /// [`UndecryptableMessage`] notice is published instead.
    ///
    /// [`PlaceholderCreated`] is only published for a new placeholder, not
    /// when an earlier failure of the same envelope already has one.
    pub async fn handle_decryption_failure(
        &self,
        envelope: &FailedEnvelope,
    ) -> Result<Option<PlaceholderRecord>, ProcessorError> {
        let mut tx = self.store.write().await;
        let now = self.clock.now();
        let outcome = create_for_failed_envelope(&mut *tx, &self.config, now, envelope)?;
        tx.commit()?;

        match &outcome {
            Some(FailureOutcome::Created(placeholder)) => publish(
                &self.event_bus.placeholder_created,
                PlaceholderCreated {
                    placeholder: placeholder.clone(),
                },
            ),
            Some(FailureOutcome::Existing(placeholder)) => debug!(
                "Repeated failure for envelope at {} maps to placeholder {}",
                envelope.timestamp,
                placeholder.row_id()
            ),
            None => publish(
                &self.event_bus.undecryptable_message,
                UndecryptableMessage {
                    sender: envelope.sender.clone(),
                    timestamp: envelope.timestamp,
                    untrusted_group_id: envelope.untrusted_group_id.clone(),
                },
            ),
        }
        Ok(outcome.map(FailureOutcome::into_record))
    }

    /// Called by the message-receipt pipeline with a successfully decrypted
    /// envelope.
    pub async fn handle_decrypted_envelope(
        &self,
        envelope: RecoveredEnvelope,
    ) -> Result<ReplacementOutcome, ProcessorError> {
        let mut tx = self.store.write().await;
        let now = self.clock.now();
        let replacement = replace_or_insert(&mut *tx, &self.config, now, envelope)?;
        tx.commit()?;

        self.publish_violations(replacement.violations);
        match replacement.outcome {
            ReplacementOutcome::Replaced { row_id } => publish(
                &self.event_bus.placeholder_replaced,
                PlaceholderReplaced {
                    row_id,
                    thread_id: replacement.thread_id,
                },
            ),
            ReplacementOutcome::InsertedAsNew { row_id, reason } => publish(
                &self.event_bus.message_inserted,
                MessageInserted {
                    row_id,
                    thread_id: replacement.thread_id,
                    reason,
                },
            ),
        }
        Ok(replacement.outcome)
    }

    /// Applies a remote delete to the placeholder for the given message.
    /// Returns `true` if a placeholder was affected.
    pub async fn handle_remote_delete(
        &self,
        sender: &ServiceAddress,
        envelope_timestamp: Timestamp,
        untrusted_group_id: Option<&GroupId>,
    ) -> Result<bool, ProcessorError> {
        let mut tx = self.store.write().await;
        let deleted = apply_remote_delete(
            &mut *tx,
            &self.config,
            sender,
            envelope_timestamp,
            untrusted_group_id,
        )?;
        tx.commit()?;

        Ok(match deleted {
            Some(placeholder) => {
                publish(
                    &self.event_bus.placeholder_deleted,
                    PlaceholderDeleted { placeholder },
                );
                true
            }
            None => false,
        })
    }

    /// Marks a single row read. Returns `false` if it already was.
    pub async fn mark_read(&self, row_id: RowId) -> Result<bool, ProcessorError> {
        let mut tx = self.store.write().await;
        let mut interaction = tx
            .interaction(row_id)?
            .ok_or_else(|| StoreError::NotFound(format!("interaction {row_id}")))?;
        if !interaction.mark_read() {
            return Ok(false);
        }
        tx.update_interaction(&interaction)?;
        tx.commit()?;
        Ok(true)
    }

    /// Marks every row in `thread_id` up to and including `up_to` read.
    /// Returns how many rows changed.
    pub async fn mark_thread_read(
        &self,
        thread_id: &ThreadId,
        up_to: SortId,
    ) -> Result<usize, ProcessorError> {
        let mut tx = self.store.write().await;
        let mut changed = 0;
        for mut interaction in tx.interactions_in_thread(thread_id)? {
            if interaction.sort_id() > up_to {
                break;
            }
            if interaction.mark_read() {
                tx.update_interaction(&interaction)?;
                changed += 1;
            }
        }
        tx.commit()?;
        debug!("Marked {changed} interactions read in thread {thread_id}");
        Ok(changed)
    }

    pub async fn unread_count(&self, thread_id: &ThreadId) -> Result<usize, ProcessorError> {
        let tx = self.store.read().await;
        Ok(tx.unread_count(thread_id)?)
    }

    pub async fn interaction(&self, row_id: RowId) -> Result<Option<Interaction>, ProcessorError> {
        let tx = self.store.read().await;
        Ok(tx.interaction(row_id)?)
    }

    pub async fn thread_history(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<Interaction>, ProcessorError> {
        let tx = self.store.read().await;
        Ok(tx.interactions_in_thread(thread_id)?)
    }

    /// Evaluates eligibility for the placeholder at `row_id` against the
    /// current clock. `None` if the row is not a placeholder.
    pub async fn supports_replacement(
        &self,
        row_id: RowId,
    ) -> Result<Option<bool>, ProcessorError> {
        let tx = self.store.read().await;
        let now = self.clock.now();
        Ok(tx
            .interaction(row_id)?
            .as_ref()
            .and_then(Interaction::as_placeholder)
            .map(|p| p.supports_replacement(now)))
    }

    fn publish_violations(&self, violations: Vec<InvariantViolation>) {
        for violation in violations {
            publish(
                &self.event_bus.invariant_failure,
                InvariantFailure { violation },
            );
        }
    }
}
