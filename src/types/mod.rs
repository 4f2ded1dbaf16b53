// Core types are re-exported; the event bus lives here because it needs the
// async runtime.
pub use phcore::types::*;
pub mod events;
