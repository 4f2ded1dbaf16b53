pub mod config;
pub mod invariant;
pub mod placeholder;
pub mod read_tracking;
pub mod store;
pub mod types;

pub use config::{ConfigError, PlaceholderConfig, SenderFallback};
pub use placeholder::{
    DisplayState, ErrorMessageBuilder, NewPlaceholder, PlaceholderError, PlaceholderRecord,
    StoredPlaceholder,
};
pub use read_tracking::{ReadState, ReadTracking};
