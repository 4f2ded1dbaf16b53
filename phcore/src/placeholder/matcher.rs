//! Reconciles a successfully decrypted envelope with an outstanding
//! placeholder.
//!
//! The lookup key is (thread, sender stable identity, envelope timestamp).
//! When the envelope carries a group id that names a known group, that
//! group's thread is searched first; the sender's one-to-one thread is always
//! searched as well, so a placeholder whose thread was resolved from the
//! sender alone still matches.
//!
//! Replacement is at-most-once: the `superseded` flag is read and set inside
//! the caller's write transaction, so of two racing receipts only the first
//! to commit replaces; the other sees the flag and inserts a new message.

use crate::config::PlaceholderConfig;
use crate::invariant::{self, InvariantViolation};
use crate::placeholder::PlaceholderRecord;
use crate::placeholder::failed_envelope::{known_group_thread, resolve_sender};
use crate::store::error::{Result, StoreError};
use crate::store::traits::{ReadTransaction, WriteTransaction};
use crate::types::{
    Aci, GroupId, Interaction, NewIncomingMessage, RecoveredEnvelope, RowId, ThreadId, Timestamp,
};
use log::{debug, info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("decrypted envelope from {0} has no stable sender identity")]
    UnresolvableSender(String),
}

/// Why a recovered envelope became a new row instead of replacing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertReason {
    NoMatch,
    /// The matching placeholder expired or was remotely deleted; it stays as
    /// a tombstone.
    Ineligible,
    /// Another receipt already replaced the matching placeholder.
    AlreadySuperseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementOutcome {
    Replaced { row_id: RowId },
    InsertedAsNew { row_id: RowId, reason: InsertReason },
}

impl ReplacementOutcome {
    pub fn row_id(&self) -> RowId {
        match self {
            Self::Replaced { row_id } | Self::InsertedAsNew { row_id, .. } => *row_id,
        }
    }

    pub fn is_replaced(&self) -> bool {
        matches!(self, Self::Replaced { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub outcome: ReplacementOutcome,
    pub thread_id: ThreadId,
    /// Invariant failures seen along the way. Already logged.
    pub violations: Vec<InvariantViolation>,
}

/// Result of searching for the placeholder a (sender, timestamp) pair refers
/// to.
#[derive(Debug, Default)]
pub(crate) struct Lookup {
    pub(crate) found: Option<PlaceholderRecord>,
    pub(crate) violations: Vec<InvariantViolation>,
}

pub(crate) fn find_placeholder<T: ReadTransaction + ?Sized>(
    tx: &T,
    sender: &Aci,
    envelope_timestamp: Timestamp,
    group_id: Option<&GroupId>,
) -> Result<Lookup> {
    let mut lookup = Lookup::default();

    let mut threads = Vec::with_capacity(2);
    if let Some(group_thread) = known_group_thread(tx, group_id)? {
        threads.push(group_thread);
    }
    if let Some(contact_thread) = tx.contact_thread(sender)?
        && !threads.contains(&contact_thread)
    {
        threads.push(contact_thread);
    }

    for thread_id in &threads {
        for candidate in tx.placeholders_at(thread_id, envelope_timestamp)? {
            match candidate.sender_aci() {
                None => {
                    let violation = InvariantViolation::MissingStableIdentity {
                        row_id: candidate.row_id(),
                    };
                    invariant::report(&violation);
                    lookup.violations.push(violation);
                }
                Some(aci) if aci == sender => {
                    lookup.found = Some(candidate);
                    return Ok(lookup);
                }
                Some(_) => {}
            }
        }
    }
    Ok(lookup)
}

/// Replaces the matching placeholder in place if it is still eligible,
/// otherwise inserts the recovered content as an ordinary message at `now`.
///
/// Fails with [`MatchError::UnresolvableSender`] when the sender has no
/// stable identity under the configured fallback (for example a bare phone
/// number with [`SenderFallback::StableIdentityOnly`]). Nothing is written in
/// that case and the recovered content is not kept; the caller must store it
/// some other way or it is lost.
///
/// [`SenderFallback::StableIdentityOnly`]: crate::config::SenderFallback::StableIdentityOnly
pub fn replace_or_insert<T: WriteTransaction + ?Sized>(
    tx: &mut T,
    config: &PlaceholderConfig,
    now: Timestamp,
    envelope: RecoveredEnvelope,
) -> std::result::Result<Replacement, MatchError> {
    let sender = resolve_sender(&*tx, config.sender_fallback, &envelope.sender)?
        .ok_or_else(|| MatchError::UnresolvableSender(envelope.sender.to_string()))?;

    let Lookup {
        found,
        mut violations,
    } = find_placeholder(
        &*tx,
        &sender,
        envelope.timestamp,
        envelope.untrusted_group_id.as_ref(),
    )?;

    let reason = match found {
        None => InsertReason::NoMatch,
        Some(placeholder) if placeholder.is_superseded() => {
            if placeholder.recovered_content().is_none() {
                let violation = InvariantViolation::SupersededWithoutContent {
                    row_id: placeholder.row_id(),
                };
                invariant::report(&violation);
                violations.push(violation);
            }
            debug!(
                "Placeholder {} was already replaced; inserting envelope at {} as a new message",
                placeholder.row_id(),
                envelope.timestamp
            );
            InsertReason::AlreadySuperseded
        }
        Some(placeholder) if !placeholder.supports_replacement(now) => {
            info!(
                "Placeholder {} is no longer replaceable (expired at {}, deleted: {}); keeping it as a tombstone",
                placeholder.row_id(),
                placeholder.expiration_date(),
                placeholder.was_remotely_deleted()
            );
            InsertReason::Ineligible
        }
        Some(mut placeholder) => {
            placeholder
                .supersede_with(envelope.content)
                .map_err(StoreError::from)?;
            tx.update_interaction(&Interaction::Placeholder(placeholder.clone()))?;
            info!(
                "Replaced placeholder {} in thread {} with recovered envelope at {}",
                placeholder.row_id(),
                placeholder.thread_id(),
                envelope.timestamp
            );
            return Ok(Replacement {
                outcome: ReplacementOutcome::Replaced {
                    row_id: placeholder.row_id(),
                },
                thread_id: placeholder.thread_id().clone(),
                violations,
            });
        }
    };

    let thread_id = match known_group_thread(&*tx, envelope.untrusted_group_id.as_ref())? {
        Some(thread_id) => thread_id,
        None => tx.get_or_create_contact_thread(&sender)?,
    };
    let message = tx.insert_message(NewIncomingMessage {
        thread_id: thread_id.clone(),
        sender,
        envelope_timestamp: envelope.timestamp,
        received_at: now,
        content: envelope.content,
    })?;
    debug!(
        "Inserted envelope at {} as message {} ({reason:?})",
        envelope.timestamp, message.row_id
    );

    Ok(Replacement {
        outcome: ReplacementOutcome::InsertedAsNew {
            row_id: message.row_id,
            reason,
        },
        thread_id,
        violations,
    })
}
