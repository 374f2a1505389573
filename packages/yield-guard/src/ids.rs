//! Identifier types for frames and hooks.
//!
//! All IDs are lightweight Copy types using newtype pattern for type safety.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity of one invocation of a unit of code.
///
/// A generator keeps the same FrameId for its whole lifetime. Frames entered
/// with [`enter_frame`](crate::frame::enter_frame) get a fresh one per entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FrameId(u64);

/// Identity of a hook registered with the monitoring registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct HookId(u64);

// Global counters for ID generation
static FRAME_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static HOOK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl FrameId {
    /// Create a fresh unique FrameId.
    pub fn fresh() -> Self {
        FrameId(FRAME_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl HookId {
    /// Create a fresh unique HookId.
    pub fn fresh() -> Self {
        HookId(HOOK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_fresh_is_unique() {
        let f1 = FrameId::fresh();
        let f2 = FrameId::fresh();
        assert_ne!(f1, f2);
        assert!(f2.raw() > f1.raw());
    }

    #[test]
    fn test_hook_id_fresh_is_unique() {
        let h1 = HookId::fresh();
        let h2 = HookId::fresh();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_frame_id_display() {
        let id = FrameId::fresh();
        assert_eq!(id.to_string(), format!("frame#{}", id.raw()));
    }
}
