//! Per-task forbid state for futures that share an executor thread.
//!
//! Generators already carry their own forbid slot. A plain task that opens a
//! scope and then awaits would otherwise leave its state installed on the
//! thread for whichever task the executor polls next; wrapping it with
//! [`isolate`] gives it the same treatment as a generator.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::context::{EnteredSlot, ForbidSlot};

/// Run `future` as its own execution context for scope tracking.
///
/// The task starts with a copy of the caller's forbid state. Scopes it opens
/// are only visible while it is being polled, and are dropped inside its own
/// context if the task is cancelled mid-way.
pub fn isolate<F: Future>(future: F) -> Isolated<F> {
    Isolated {
        slot: ForbidSlot::inherit(),
        future: Some(Box::pin(future)),
    }
}

/// Future returned by [`isolate`].
#[must_use = "futures do nothing unless awaited"]
pub struct Isolated<F> {
    slot: ForbidSlot,
    future: Option<Pin<Box<F>>>,
}

impl<F> Unpin for Isolated<F> {}

impl<F: Future> Future for Isolated<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        let this = self.get_mut();
        let Some(future) = this.future.as_mut() else {
            panic!("`Isolated` polled after completion");
        };

        let _slot = EnteredSlot::enter(&mut this.slot);
        let outcome = future.as_mut().poll(cx);
        if outcome.is_ready() {
            this.future = None;
        }
        outcome
    }
}

impl<F> Drop for Isolated<F> {
    fn drop(&mut self) {
        if self.future.is_some() {
            let _slot = EnteredSlot::enter(&mut self.slot);
            self.future = None;
        }
    }
}

impl<F> fmt::Debug for Isolated<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Isolated")
            .field("forbid", &self.slot.state())
            .field("finished", &self.future.is_none())
            .finish()
    }
}
