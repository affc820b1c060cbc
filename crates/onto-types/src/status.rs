//! Entity lifecycle status flags.

use serde::{Deserialize, Serialize};

/// Lifecycle flags of an in-memory entity.
///
/// Each flag has a combined accessor: `None` reads the flag, `Some(b)` sets
/// it and returns the state after the change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    inited: bool,
    dirty: bool,
    committed: bool,
    encoded: bool,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mandatory offsets are present.
    pub fn inited(&mut self, value: Option<bool>) -> bool {
        if let Some(v) = value {
            self.inited = v;
        }
        self.inited
    }

    /// The entity was mutated since it was last loaded or committed.
    pub fn dirty(&mut self, value: Option<bool>) -> bool {
        if let Some(v) = value {
            self.dirty = v;
        }
        self.dirty
    }

    /// The entity was loaded from, or written to, the store.
    pub fn committed(&mut self, value: Option<bool>) -> bool {
        if let Some(v) = value {
            self.committed = v;
        }
        self.committed
    }

    /// Values need transport decoding before use.
    pub fn encoded(&mut self, value: Option<bool>) -> bool {
        if let Some(v) = value {
            self.encoded = v;
        }
        self.encoded
    }

    pub fn is_inited(&self) -> bool {
        self.inited
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn is_encoded(&self) -> bool {
        self.encoded
    }
}
