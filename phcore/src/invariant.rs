use crate::types::ids::RowId;
use thiserror::Error;

/// Log target invariant failures are reported under.
pub const INVARIANT_LOG_TARGET: &str = "placeholder::invariant";

/// Internal consistency failures. These are reported, never propagated: the
/// pipeline that found one carries on with an ordinary insertion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("placeholder {row_id} matched on timestamp but has no stable sender identity")]
    MissingStableIdentity { row_id: RowId },

    #[error("placeholder {row_id} is superseded but carries no recovered content")]
    SupersededWithoutContent { row_id: RowId },
}

impl InvariantViolation {
    pub fn row_id(&self) -> RowId {
        match self {
            Self::MissingStableIdentity { row_id } | Self::SupersededWithoutContent { row_id } => {
                *row_id
            }
        }
    }
}

pub(crate) fn report(violation: &InvariantViolation) {
    log::error!(target: INVARIANT_LOG_TARGET, "Invariant failure: {violation}");
}
