//! Scope tracker: the forbid state and its scoped acquisition.
//!
//! The current [`ForbidState`] lives in the slot of the running execution
//! context: the thread itself, or the generator or [`isolate`](crate::isolate)d
//! task being polled on it. Opening a scope swaps a new value in and keeps
//! the previous one in the returned [`ForbidScope`]; dropping the guard puts
//! it back. Nested scopes therefore behave like a stack, including when a
//! body unwinds or a generator holding the guard is dropped mid-way.

use std::marker::PhantomData;
use std::panic::Location;
use std::sync::Arc;

use log::{debug, warn};

use crate::context::{self, ContextToken};
use crate::frame;
use crate::ids::FrameId;

/// Whether suspension is currently forbidden, for which frame, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForbidState {
    owner_frame: Option<FrameId>,
    reason: Option<Arc<str>>,
    allowed: bool,
    location: &'static Location<'static>,
}

impl ForbidState {
    pub(crate) fn forbidding(
        owner: FrameId,
        reason: &str,
        location: &'static Location<'static>,
    ) -> Self {
        ForbidState {
            owner_frame: Some(owner),
            reason: Some(Arc::from(reason)),
            allowed: false,
            location,
        }
    }

    /// Re-allowing state. Remembers the enclosing reason, if any, so the
    /// enclosing scope reads the same once this one closes.
    pub(crate) fn allowing(
        enclosing: Option<&ForbidState>,
        location: &'static Location<'static>,
    ) -> Self {
        ForbidState {
            owner_frame: None,
            reason: enclosing.and_then(|state| state.reason.clone()),
            allowed: true,
            location,
        }
    }

    pub fn owner_frame(&self) -> Option<FrameId> {
        self.owner_frame
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub(crate) fn reason_arc(&self) -> Option<Arc<str>> {
        self.reason.clone()
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Where the scope that installed this state was opened.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// True when a suspension directly in `frame` must be rejected.
    pub fn forbids_frame(&self, frame: FrameId) -> bool {
        !self.allowed && self.owner_frame == Some(frame)
    }
}

/// Guard returned by [`with_suspension_forbidden`]; restores the previous
/// state when dropped.
///
/// Not `Send`: the state it restores belongs to the thread that opened it.
#[must_use = "the scope ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ForbidScope {
    state: ForbidState,
    token: Option<ContextToken>,
    _not_send: PhantomData<*const ()>,
}

impl ForbidScope {
    /// The state this scope installed.
    pub fn state(&self) -> &ForbidState {
        &self.state
    }
}

impl Drop for ForbidScope {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        let location = self.state.location;
        if let Some(false) = context::try_with_context(|cx| cx.restore_forbid(token)) {
            warn!("suspension scope opened at {location} exited out of order");
        }
    }
}

/// Open a scope in the calling frame.
///
/// `Some(reason)` forbids suspension directly in the calling frame until the
/// guard drops; `None` re-allows it inside an enclosing forbidding scope.
#[track_caller]
pub fn with_suspension_forbidden(reason: Option<&str>) -> ForbidScope {
    enter_scope(reason, 1, Location::caller())
}

/// Like [`with_suspension_forbidden`], but owned by the frame `stack_level`
/// levels out (1 = the calling frame).
///
/// Level 0 names no frame; it is treated as 1 with a warning. Levels past the
/// outermost frame resolve to the thread's root frame, also with a warning.
///
/// Lets a helper running in its own frame open a scope on behalf of its
/// caller. The reported location follows `#[track_caller]`, so such helpers
/// should carry that attribute as well.
#[track_caller]
pub fn with_suspension_forbidden_at(reason: Option<&str>, stack_level: usize) -> ForbidScope {
    enter_scope(reason, stack_level, Location::caller())
}

/// Forbid suspension directly in the calling frame until the guard drops.
///
/// Shorthand for `with_suspension_forbidden(Some(reason))`.
#[track_caller]
pub fn forbid_suspension(reason: &str) -> ForbidScope {
    enter_scope(Some(reason), 1, Location::caller())
}

/// Lift an enclosing forbidding scope until the guard drops.
///
/// Shorthand for `with_suspension_forbidden(None)`.
#[track_caller]
pub fn allow_suspension() -> ForbidScope {
    enter_scope(None, 1, Location::caller())
}

/// Snapshot of the current thread's forbid state.
pub fn current_forbid_state() -> Option<ForbidState> {
    context::with_context(|cx| cx.forbid().cloned())
}

/// Whether some frame on this thread currently has suspension forbidden.
pub fn is_suspension_forbidden() -> bool {
    context::with_context(|cx| cx.forbid().is_some_and(|state| !state.is_allowed()))
}

fn enter_scope(
    reason: Option<&str>,
    stack_level: usize,
    location: &'static Location<'static>,
) -> ForbidScope {
    if stack_level == 0 {
        warn!("stack level 0 at {location} names no frame; using the calling frame");
    }
    let (owner, clamped) = frame::resolve_frame(stack_level);
    if clamped {
        warn!(
            "stack level {stack_level} at {location} is deeper than the frame stack; \
             using the root frame"
        );
    }

    let (state, token) = context::with_context(|cx| {
        let state = match reason {
            Some(reason) => {
                debug!(
                    "suspension forbidden in {} ({}) at {location}: {reason}",
                    owner.name(),
                    owner.id()
                );
                ForbidState::forbidding(owner.id(), reason, location)
            }
            None => {
                let enclosing = cx.forbid();
                if enclosing.is_some() {
                    debug!("suspension allowed again at {location}");
                }
                ForbidState::allowing(enclosing, location)
            }
        };
        let token = cx.swap_forbid(state.clone());
        (state, token)
    });

    ForbidScope {
        state,
        token: Some(token),
        _not_send: PhantomData,
    }
}
