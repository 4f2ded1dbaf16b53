use phcore::invariant::InvariantViolation;
use phcore::placeholder::PlaceholderRecord;
use phcore::placeholder::matcher::InsertReason;
use phcore::types::{GroupId, RowId, ServiceAddress, ThreadId, Timestamp};
use std::sync::Arc;
use tokio::sync::broadcast;

// The size of the broadcast channel buffer.
const CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct PlaceholderCreated {
    pub placeholder: PlaceholderRecord,
}

/// Standalone decryption-error notice, raised when no placeholder could be
/// created for a failed envelope.
#[derive(Debug, Clone)]
pub struct UndecryptableMessage {
    pub sender: ServiceAddress,
    pub timestamp: Timestamp,
    pub untrusted_group_id: Option<GroupId>,
}

#[derive(Debug, Clone)]
pub struct PlaceholderReplaced {
    pub row_id: RowId,
    pub thread_id: ThreadId,
}

#[derive(Debug, Clone)]
pub struct MessageInserted {
    pub row_id: RowId,
    pub thread_id: ThreadId,
    pub reason: InsertReason,
}

#[derive(Debug, Clone)]
pub struct PlaceholderDeleted {
    pub placeholder: PlaceholderRecord,
}

#[derive(Debug, Clone)]
pub struct InvariantFailure {
    pub violation: InvariantViolation,
}

// Macro to generate EventBus fields and constructor
macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus with one broadcast channel per event type.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: broadcast::channel(CHANNEL_CAPACITY).0,
                    )*
                }
            }
        }
    };
}

define_event_bus! {
    // Decryption pipeline
    (placeholder_created, Arc<PlaceholderCreated>),
    (undecryptable_message, Arc<UndecryptableMessage>),

    // Receipt pipeline
    (placeholder_replaced, Arc<PlaceholderReplaced>),
    (message_inserted, Arc<MessageInserted>),
    (placeholder_deleted, Arc<PlaceholderDeleted>),

    // Observability
    (invariant_failure, Arc<InvariantFailure>),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Sends to a channel, ignoring the error when nobody is subscribed.
pub(crate) fn publish<T>(sender: &broadcast::Sender<Arc<T>>, event: T) {
    let _ = sender.send(Arc::new(event));
}
