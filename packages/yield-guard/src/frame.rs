//! Call frames and explicit call-context tokens.
//!
//! Rust has no frame introspection, so identities are threaded explicitly:
//! generator drivers push their frame for the duration of every resumption,
//! and ordinary code that wants its own identity enters one with
//! [`enter_frame`]. Each thread also has a root frame standing in for
//! top-level code.

use std::marker::PhantomData;
use std::panic::Location;
use std::sync::Arc;

use log::warn;

use crate::context::{try_with_context, with_context};
use crate::ids::FrameId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    id: FrameId,
    name: Arc<str>,
    location: &'static Location<'static>,
}

impl FrameInfo {
    pub(crate) fn new(name: Arc<str>, location: &'static Location<'static>) -> Self {
        FrameInfo {
            id: FrameId::fresh(),
            name,
            location,
        }
    }

    pub(crate) fn root() -> Self {
        Self::new(Arc::from("<root>"), Location::caller())
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the frame was entered (or the generator constructed).
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

/// Keeps an explicitly entered frame on the stack until dropped.
///
/// Must not be held across a suspension point: generator drivers truncate the
/// stack back to their entry depth after every resumption.
#[must_use = "the frame is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct FrameGuard {
    id: FrameId,
    _not_send: PhantomData<*const ()>,
}

impl FrameGuard {
    pub fn id(&self) -> FrameId {
        self.id
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        let id = self.id;
        let _ = try_with_context(|cx| cx.remove_frame(id));
    }
}

/// Push a fresh call-context token for the calling code.
#[track_caller]
pub fn enter_frame(name: impl Into<Arc<str>>) -> FrameGuard {
    let frame = FrameInfo::new(name.into(), Location::caller());
    let id = frame.id();
    with_context(|cx| cx.push_frame(frame));
    FrameGuard {
        id,
        _not_send: PhantomData,
    }
}

/// The innermost frame of the current thread.
pub fn current_frame() -> FrameInfo {
    with_context(|cx| cx.current_frame().clone())
}

/// Walk `level` frames outwards: 1 is the innermost, 2 its caller.
///
/// Levels past the outermost frame resolve to the root frame.
pub fn frame_at(level: usize) -> FrameInfo {
    resolve_frame(level).0
}

/// Number of frames above the root.
pub fn frame_depth() -> usize {
    with_context(|cx| cx.depth())
}

/// Returns the frame and whether `level` had to be clamped to the root.
pub(crate) fn resolve_frame(level: usize) -> (FrameInfo, bool) {
    with_context(|cx| match cx.frame_at(level) {
        Some(frame) => (frame.clone(), false),
        None => (cx.root_frame().clone(), true),
    })
}

/// A generator frame pushed for one resumption.
pub(crate) struct ActiveFrame {
    depth: usize,
}

impl ActiveFrame {
    pub(crate) fn enter(frame: &FrameInfo) -> Self {
        let depth = with_context(|cx| {
            let depth = cx.depth();
            cx.push_frame(frame.clone());
            depth
        });
        ActiveFrame { depth }
    }
}

impl Drop for ActiveFrame {
    fn drop(&mut self) {
        let depth = self.depth;
        let removed = try_with_context(|cx| cx.truncate_frames(depth)).unwrap_or(0);
        if removed > 1 {
            warn!(
                "{} frame(s) entered inside a generator were still open when it suspended",
                removed - 1
            );
        }
    }
}
