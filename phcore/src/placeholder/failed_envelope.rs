use crate::config::{PlaceholderConfig, SenderFallback};
use crate::placeholder::matcher::find_placeholder;
use crate::placeholder::{NewPlaceholder, PlaceholderRecord};
use crate::store::error::Result;
use crate::store::traits::{ReadTransaction, WriteTransaction};
use crate::types::{Aci, FailedEnvelope, GroupId, ServiceAddress, ThreadId, Timestamp};
use log::{debug, info, warn};

/// Turns a sender address into the stable identity used as a matching key.
pub(crate) fn resolve_sender<T: ReadTransaction + ?Sized>(
    tx: &T,
    fallback: SenderFallback,
    sender: &ServiceAddress,
) -> Result<Option<Aci>> {
    if let Some(aci) = &sender.aci {
        return Ok(Some(aci.clone()));
    }
    match (fallback, &sender.phone_number) {
        (SenderFallback::PhoneNumber, Some(phone_number)) => {
            let aci = tx.aci_for_phone_number(phone_number)?;
            if aci.is_none() {
                debug!("No stable identity known for {phone_number}");
            }
            Ok(aci)
        }
        _ => Ok(None),
    }
}

/// Group thread if the (untrusted) group id names a group we already have,
/// otherwise `None`. Never creates a group thread.
pub(crate) fn known_group_thread<T: ReadTransaction + ?Sized>(
    tx: &T,
    group_id: Option<&GroupId>,
) -> Result<Option<ThreadId>> {
    match group_id {
        Some(group_id) => tx.group_thread(group_id),
        None => Ok(None),
    }
}

/// What a failed envelope left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    Created(PlaceholderRecord),
    /// An earlier failure of the same envelope already has a placeholder,
    /// possibly one that has since been replaced.
    Existing(PlaceholderRecord),
}

impl FailureOutcome {
    pub fn record(&self) -> &PlaceholderRecord {
        match self {
            Self::Created(record) | Self::Existing(record) => record,
        }
    }

    pub fn into_record(self) -> PlaceholderRecord {
        match self {
            Self::Created(record) | Self::Existing(record) => record,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Creates a placeholder for an envelope that failed to decrypt.
///
/// Returns `Ok(None)` when the sender has no resolvable stable identity: such
/// a placeholder could never be matched, so nothing is written. Looks for an
/// existing placeholder in every thread the matcher would search, and returns
/// it as [`FailureOutcome::Existing`] instead of inserting a second one.
pub fn create_for_failed_envelope<T: WriteTransaction + ?Sized>(
    tx: &mut T,
    config: &PlaceholderConfig,
    now: Timestamp,
    envelope: &FailedEnvelope,
) -> Result<Option<FailureOutcome>> {
    let Some(sender) = resolve_sender(&*tx, config.sender_fallback, &envelope.sender)? else {
        warn!(
            "Not creating placeholder for envelope at {} from {}: no stable sender identity",
            envelope.timestamp, envelope.sender
        );
        return Ok(None);
    };

    // Violations found here are already reported by the lookup.
    let lookup = find_placeholder(
        &*tx,
        &sender,
        envelope.timestamp,
        envelope.untrusted_group_id.as_ref(),
    )?;
    if let Some(existing) = lookup.found {
        debug!(
            "Placeholder {} in thread {} already covers envelope at {} from {sender}",
            existing.row_id(),
            existing.thread_id(),
            envelope.timestamp
        );
        return Ok(Some(FailureOutcome::Existing(existing)));
    }

    let thread_id = match known_group_thread(&*tx, envelope.untrusted_group_id.as_ref())? {
        Some(thread_id) => thread_id,
        None => tx.get_or_create_contact_thread(&sender)?,
    };

    let new = NewPlaceholder::for_failed_envelope(
        thread_id,
        sender,
        envelope.sender.phone_number.clone(),
        envelope.timestamp,
        envelope.untrusted_group_id.clone(),
        now,
        config.grace_period,
    )?;
    let record = tx.insert_placeholder(new)?;

    info!(
        "Created placeholder {} in thread {} for envelope at {} (replaceable until {})",
        record.row_id(),
        record.thread_id(),
        record.envelope_timestamp(),
        record.expiration_date()
    );
    Ok(Some(FailureOutcome::Created(record)))
}
