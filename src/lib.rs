// Core modules live in `phcore` and are re-exported here.
pub use phcore::{config, invariant, placeholder, read_tracking};

pub mod types;

pub mod clock;
pub mod error;
pub mod processor;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ProcessorError;
pub use processor::MessageProcessor;
pub use store::MemoryMessageStore;
