//! Async generators.
//!
//! An async generator's frame suspends for two different reasons: a true
//! yield handing a value to the consumer, and every await that cannot
//! complete yet. Both are reported to the monitoring hooks, the former as a
//! [`SuspendedValue::Wrapped`] value and the latter as
//! [`SuspendedValue::Await`], so a filter can tell them apart.

use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;

use crate::context::{EnteredSlot, ForbidSlot};
use crate::coroutine::{Airlock, Co, Shared};
use crate::error::GuardError;
use crate::event::{CodeInfo, SuspendedValue};
use crate::frame::{ActiveFrame, FrameInfo};

/// An async generator, consumed as a [`Stream`] of yielded values.
///
/// A rejected suspension ends the stream with a single `Err` item; the body
/// is dropped first, restoring every scope it held. The body's return value
/// can be taken with [`take_return_value`](AsyncGenerator::take_return_value)
/// once the stream has ended normally.
///
/// Each async generator is its own execution context for scope tracking: its
/// forbid slot starts as a copy of the creator's state and is swapped in for
/// every poll, so generators interleaved on one executor thread never see
/// each other's scopes.
pub struct AsyncGenerator<'a, Y, R = ()> {
    shared: Rc<Shared<Y>>,
    slot: ForbidSlot,
    body: Option<Pin<Box<dyn Future<Output = R> + 'a>>>,
    returned: Option<R>,
}

// `R` is only ever moved, never pinned in place.
impl<Y, R> Unpin for AsyncGenerator<'_, Y, R> {}

impl<'a, Y, R> AsyncGenerator<'a, Y, R> {
    #[track_caller]
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, producer: F) -> Self
    where
        F: FnOnce(Co<Y>) -> Fut,
        Fut: Future<Output = R> + 'a,
    {
        let name = name.into();
        let frame = FrameInfo::new(Arc::clone(&name), Location::caller());
        let shared = Rc::new(Shared::new(frame, CodeInfo::async_generator(name)));
        let body = producer(Co::new(Rc::clone(&shared)));
        AsyncGenerator {
            shared,
            slot: ForbidSlot::inherit(),
            body: Some(Box::pin(body)),
            returned: None,
        }
    }

    pub fn frame(&self) -> &FrameInfo {
        self.shared.frame()
    }

    pub fn is_finished(&self) -> bool {
        self.body.is_none()
    }

    pub fn take_return_value(&mut self) -> Option<R> {
        self.returned.take()
    }
}

impl<Y, R> Stream for AsyncGenerator<'_, Y, R> {
    type Item = Result<Y, GuardError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(body) = this.body.as_mut() else {
            return Poll::Ready(None);
        };

        let _slot = EnteredSlot::enter(&mut this.slot);
        let _active = ActiveFrame::enter(this.shared.frame());
        let outcome = body.as_mut().poll(cx);
        match outcome {
            Poll::Ready(value) => {
                this.body = None;
                this.returned = Some(value);
                Poll::Ready(None)
            }
            Poll::Pending => match this.shared.take_airlock() {
                Airlock::Yielded(value) => Poll::Ready(Some(Ok(value))),
                Airlock::Rejected(err) => {
                    this.body = None;
                    Poll::Ready(Some(Err(err.into())))
                }
                Airlock::Empty => match this.shared.suspend(SuspendedValue::Await, None) {
                    Ok(()) => Poll::Pending,
                    Err(err) => {
                        this.body = None;
                        Poll::Ready(Some(Err(err.into())))
                    }
                },
            },
        }
    }
}

impl<Y, R> Drop for AsyncGenerator<'_, Y, R> {
    fn drop(&mut self) {
        if self.body.is_some() {
            let _slot = EnteredSlot::enter(&mut self.slot);
            self.body = None;
        }
    }
}

impl<Y, R> fmt::Debug for AsyncGenerator<'_, Y, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncGenerator")
            .field("name", &self.shared.code().name())
            .field("frame", &self.shared.frame().id())
            .field("finished", &self.body.is_none())
            .finish()
    }
}

/// Future that suspends exactly once, waking itself, before completing.
#[derive(Debug, Default)]
#[must_use = "futures do nothing unless awaited"]
pub struct Checkpoint {
    yielded: bool,
}

/// A scheduler checkpoint: gives other tasks on the executor one chance to
/// run. Inside an async generator this is an await, never a yield.
pub fn checkpoint() -> Checkpoint {
    Checkpoint::default()
}

impl Future for Checkpoint {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
