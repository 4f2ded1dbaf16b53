use crate::config::PlaceholderConfig;
use crate::placeholder::PlaceholderRecord;
use crate::placeholder::failed_envelope::resolve_sender;
use crate::placeholder::matcher::find_placeholder;
use crate::store::error::Result;
use crate::store::traits::WriteTransaction;
use crate::types::{GroupId, Interaction, ServiceAddress, Timestamp};
use log::{debug, info};

/// Applies a remote delete for the message `sender` sent at
/// `envelope_timestamp` to the placeholder standing in for it, if any.
///
/// Once deleted, a placeholder can never be replaced. Returns the updated
/// record, or `None` if no placeholder was affected.
pub fn apply_remote_delete<T: WriteTransaction + ?Sized>(
    tx: &mut T,
    config: &PlaceholderConfig,
    sender: &ServiceAddress,
    envelope_timestamp: Timestamp,
    untrusted_group_id: Option<&GroupId>,
) -> Result<Option<PlaceholderRecord>> {
    let Some(sender) = resolve_sender(&*tx, config.sender_fallback, sender)? else {
        debug!("Ignoring remote delete from {sender}: no stable identity");
        return Ok(None);
    };

    let lookup = find_placeholder(&*tx, &sender, envelope_timestamp, untrusted_group_id)?;
    let Some(mut placeholder) = lookup.found else {
        return Ok(None);
    };
    if placeholder.is_superseded() {
        // The real message owns this row now; deleting it is the host's job.
        return Ok(None);
    }
    if !placeholder.mark_remotely_deleted() {
        return Ok(Some(placeholder));
    }

    tx.update_interaction(&Interaction::Placeholder(placeholder.clone()))?;
    info!(
        "Placeholder {} for envelope at {} was remotely deleted",
        placeholder.row_id(),
        envelope_timestamp
    );
    Ok(Some(placeholder))
}
