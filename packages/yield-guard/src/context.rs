//! Per-thread execution context.
//!
//! Each thread owns a frame stack and the forbid slot of whatever logical
//! execution context is running on it right now. Generators and
//! [`isolate`](crate::task::isolate)d futures carry a detached [`ForbidSlot`]
//! of their own and swap it in for the duration of every poll, so flows
//! interleaved on one thread never observe each other's scopes. Nothing in
//! here is shared across threads, so no locking is involved.

use std::cell::RefCell;

use crate::frame::FrameInfo;
use crate::ids::FrameId;
use crate::scope::ForbidState;

#[derive(Debug)]
pub(crate) struct ExecutionContext {
    forbid: Option<ForbidState>,
    /// Serial of the value currently in `forbid` (0 = never set).
    forbid_serial: u64,
    next_serial: u64,
    root: FrameInfo,
    frames: Vec<FrameInfo>,
}

/// Previous slot value, handed out on scope entry and consumed on exit.
#[derive(Debug)]
pub(crate) struct ContextToken {
    previous: Option<ForbidState>,
    previous_serial: u64,
    installed_serial: u64,
}

/// Forbid state owned by one logical execution context while it is not
/// running.
#[derive(Debug, Clone, Default)]
pub(crate) struct ForbidSlot {
    state: Option<ForbidState>,
    serial: u64,
}

impl ForbidSlot {
    /// Copy of the slot currently installed on this thread, so a new flow
    /// starts out with its creator's state.
    pub(crate) fn inherit() -> Self {
        try_with_context(|cx| cx.snapshot_slot()).unwrap_or_default()
    }

    pub(crate) fn state(&self) -> Option<&ForbidState> {
        self.state.as_ref()
    }
}

thread_local! {
    static CONTEXT: RefCell<ExecutionContext> = RefCell::new(ExecutionContext::new());
}

impl ExecutionContext {
    fn new() -> Self {
        ExecutionContext {
            forbid: None,
            forbid_serial: 0,
            next_serial: 1,
            root: FrameInfo::root(),
            frames: Vec::new(),
        }
    }

    pub(crate) fn forbid(&self) -> Option<&ForbidState> {
        self.forbid.as_ref()
    }

    pub(crate) fn swap_forbid(&mut self, state: ForbidState) -> ContextToken {
        let installed_serial = self.next_serial;
        self.next_serial += 1;
        let previous = self.forbid.replace(state);
        let previous_serial = std::mem::replace(&mut self.forbid_serial, installed_serial);
        ContextToken {
            previous,
            previous_serial,
            installed_serial,
        }
    }

    /// Puts the token's saved value back. Returns false when the slot no
    /// longer held the value this token installed (out-of-order exit).
    pub(crate) fn restore_forbid(&mut self, token: ContextToken) -> bool {
        let in_order = self.forbid_serial == token.installed_serial;
        self.forbid = token.previous;
        self.forbid_serial = token.previous_serial;
        in_order
    }

    pub(crate) fn snapshot_slot(&self) -> ForbidSlot {
        ForbidSlot {
            state: self.forbid.clone(),
            serial: self.forbid_serial,
        }
    }

    /// Install `slot` and return the one it displaced.
    pub(crate) fn replace_slot(&mut self, slot: ForbidSlot) -> ForbidSlot {
        ForbidSlot {
            state: std::mem::replace(&mut self.forbid, slot.state),
            serial: std::mem::replace(&mut self.forbid_serial, slot.serial),
        }
    }

    pub(crate) fn root_frame(&self) -> &FrameInfo {
        &self.root
    }

    pub(crate) fn current_frame(&self) -> &FrameInfo {
        self.frames.last().unwrap_or(&self.root)
    }

    /// Level 1 is the innermost frame, level 2 its caller. The root frame
    /// sits one level past the pushed frames; anything deeper is `None`.
    pub(crate) fn frame_at(&self, level: usize) -> Option<&FrameInfo> {
        let level = level.max(1);
        let depth = self.frames.len();
        if level <= depth {
            Some(&self.frames[depth - level])
        } else if level == depth + 1 {
            Some(&self.root)
        } else {
            None
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn push_frame(&mut self, frame: FrameInfo) {
        self.frames.push(frame);
    }

    pub(crate) fn remove_frame(&mut self, id: FrameId) -> bool {
        match self.frames.iter().rposition(|frame| frame.id() == id) {
            Some(pos) => {
                self.frames.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Drops every frame above `depth`, returning how many were removed.
    pub(crate) fn truncate_frames(&mut self, depth: usize) -> usize {
        let removed = self.frames.len().saturating_sub(depth);
        self.frames.truncate(depth);
        removed
    }
}

pub(crate) fn with_context<R>(f: impl FnOnce(&mut ExecutionContext) -> R) -> R {
    CONTEXT.with(|cell| f(&mut cell.borrow_mut()))
}

/// Like [`with_context`], but yields `None` once the thread's context has been
/// torn down (guards dropped during thread exit).
pub(crate) fn try_with_context<R>(f: impl FnOnce(&mut ExecutionContext) -> R) -> Option<R> {
    CONTEXT.try_with(|cell| f(&mut cell.borrow_mut())).ok()
}

/// A detached slot installed on the current thread. Dropping the guard
/// stores whatever the slot then holds back into its owner and reinstates
/// the displaced one.
pub(crate) struct EnteredSlot<'s> {
    owner: &'s mut ForbidSlot,
    displaced: Option<ForbidSlot>,
}

impl<'s> EnteredSlot<'s> {
    pub(crate) fn enter(owner: &'s mut ForbidSlot) -> Self {
        let displaced = try_with_context(|cx| cx.replace_slot(std::mem::take(&mut *owner)));
        EnteredSlot { owner, displaced }
    }
}

impl Drop for EnteredSlot<'_> {
    fn drop(&mut self) {
        let Some(displaced) = self.displaced.take() else {
            return;
        };
        if let Some(slot) = try_with_context(|cx| cx.replace_slot(displaced)) {
            *self.owner = slot;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::Location;
    use std::sync::Arc;

    use super::*;

    fn frame(name: &str) -> FrameInfo {
        FrameInfo::new(Arc::from(name), Location::caller())
    }

    fn allowed() -> ForbidState {
        ForbidState::allowing(None, Location::caller())
    }

    #[test]
    fn test_swap_and_restore_in_order() {
        let mut cx = ExecutionContext::new();
        let outer = cx.swap_forbid(allowed());
        let inner = cx.swap_forbid(allowed());
        assert!(cx.restore_forbid(inner));
        assert!(cx.forbid().is_some());
        assert!(cx.restore_forbid(outer));
        assert!(cx.forbid().is_none());
    }

    #[test]
    fn test_out_of_order_restore_is_reported() {
        let mut cx = ExecutionContext::new();
        let outer = cx.swap_forbid(allowed());
        let inner = cx.swap_forbid(allowed());
        assert!(!cx.restore_forbid(outer));
        assert!(cx.forbid().is_none());
        // The late inner exit puts the outer value back, as a context var would.
        assert!(!cx.restore_forbid(inner));
        assert!(cx.forbid().is_some());
    }

    #[test]
    fn test_replace_slot_round_trips_serials() {
        let mut cx = ExecutionContext::new();
        let _outer = cx.swap_forbid(allowed());
        let detached = cx.replace_slot(ForbidSlot::default());
        assert!(cx.forbid().is_none());

        let token = cx.swap_forbid(allowed());
        let inner = cx.replace_slot(detached);
        assert!(cx.forbid().is_some());

        // Back in the slot it was opened in, the token restores in order.
        let outer = cx.replace_slot(inner);
        assert!(cx.restore_forbid(token));
        assert!(cx.forbid().is_none());
        assert!(outer.state().is_some());
    }

    #[test]
    fn test_entered_slot_keeps_changes_out_of_the_thread() {
        let mut slot = ForbidSlot::default();
        {
            let _entered = EnteredSlot::enter(&mut slot);
            let _token = with_context(|cx| cx.swap_forbid(allowed()));
        }
        assert!(with_context(|cx| cx.forbid().is_none()));
        assert!(slot.state().is_some_and(ForbidState::is_allowed));

        let _entered = EnteredSlot::enter(&mut slot);
        assert!(with_context(|cx| cx.forbid().is_some()));
    }

    #[test]
    fn test_frame_levels() {
        let mut cx = ExecutionContext::new();
        let root = cx.root_frame().id();
        assert_eq!(cx.current_frame().id(), root);

        let a = frame("a");
        let b = frame("b");
        let (a_id, b_id) = (a.id(), b.id());
        cx.push_frame(a);
        cx.push_frame(b);

        assert_eq!(cx.frame_at(0).map(FrameInfo::id), Some(b_id));
        assert_eq!(cx.frame_at(1).map(FrameInfo::id), Some(b_id));
        assert_eq!(cx.frame_at(2).map(FrameInfo::id), Some(a_id));
        assert_eq!(cx.frame_at(3).map(FrameInfo::id), Some(root));
        assert!(cx.frame_at(4).is_none());
    }

    #[test]
    fn test_remove_and_truncate_frames() {
        let mut cx = ExecutionContext::new();
        let a = frame("a");
        let a_id = a.id();
        cx.push_frame(a);
        cx.push_frame(frame("b"));
        cx.push_frame(frame("c"));

        assert!(cx.remove_frame(a_id));
        assert!(!cx.remove_frame(a_id));
        assert_eq!(cx.depth(), 2);
        assert_eq!(cx.truncate_frames(1), 1);
        assert_eq!(cx.truncate_frames(5), 0);
        assert_eq!(cx.current_frame().name(), "b");
    }
}
