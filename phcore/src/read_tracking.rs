//! Read/unread participation in conversation accounting.
//!
//! Anything that shows up in a thread's unread count implements
//! [`ReadTracking`]. Records compose a [`ReadState`] rather than inheriting
//! behaviour from a message base type.

use serde::{Deserialize, Serialize};

pub trait ReadTracking {
    fn is_read(&self) -> bool;

    /// Marks the item read. Returns `true` only on the unread -> read
    /// transition; further calls are no-ops.
    fn mark_read(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadState(bool);

impl ReadState {
    pub const fn new(read: bool) -> Self {
        Self(read)
    }
}

impl ReadTracking for ReadState {
    fn is_read(&self) -> bool {
        self.0
    }

    fn mark_read(&mut self) -> bool {
        let changed = !self.0;
        self.0 = true;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_read_is_idempotent() {
        let mut state = ReadState::default();
        assert!(!state.is_read());
        assert!(state.mark_read());
        assert!(state.is_read());
        assert!(!state.mark_read());
        assert!(state.is_read());
    }
}
