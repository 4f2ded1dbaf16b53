pub mod memory;
pub mod traits;

pub use memory::MemoryMessageStore;
pub use phcore::store::error::{Result, StoreError};
