//! Content generation stamps.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Identifies one content generation of a buffer.
///
/// A new serial is issued whenever a buffer's storage is (re)allocated or its
/// contents change, so consumers can tell stale bindings apart by comparing
/// serials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Serial(u64);

impl Serial {
    /// Serial of a binding without a backing buffer.
    pub const NONE: Serial = Serial(0);

    /// Issue a fresh serial, distinct from every serial issued before.
    pub fn issue() -> Self {
        Self(NEXT_SERIAL.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}
