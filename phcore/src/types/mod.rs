pub mod envelope;
pub mod identity;
pub mod ids;
pub mod message;

pub use envelope::{FailedEnvelope, RecoveredEnvelope};
pub use identity::{Aci, GroupId, PhoneNumber, PhoneNumberMapping, ServiceAddress};
pub use ids::{RowId, SortId, ThreadId, Timestamp, UniqueId};
pub use message::{
    ErrorMessageType, IncomingMessage, Interaction, NewIncomingMessage, RecoveredContent,
};
