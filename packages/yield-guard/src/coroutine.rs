//! Yield protocol shared by [`Generator`](crate::generator::Generator) and
//! [`AsyncGenerator`](crate::async_generator::AsyncGenerator).
//!
//! A generator body is an ordinary future that receives a [`Co`] handle.
//! Awaiting [`Co::yield_`] reports the suspension to the monitoring hooks
//! and parks the value in the generator's airlock; the driver picks it up as
//! soon as the body returns `Pending`.

use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::error::SuspensionForbidden;
use crate::event::{CodeInfo, SuspendedValue, SuspensionEvent};
use crate::frame::FrameInfo;
use crate::ids::FrameId;
use crate::monitoring;

pub(crate) enum Airlock<Y> {
    Empty,
    Yielded(Y),
    Rejected(SuspensionForbidden),
}

pub(crate) struct Shared<Y> {
    frame: FrameInfo,
    code: CodeInfo,
    suspensions: Cell<u32>,
    airlock: RefCell<Airlock<Y>>,
}

impl<Y> Shared<Y> {
    pub(crate) fn new(frame: FrameInfo, code: CodeInfo) -> Self {
        Shared {
            frame,
            code,
            suspensions: Cell::new(0),
            airlock: RefCell::new(Airlock::Empty),
        }
    }

    pub(crate) fn frame(&self) -> &FrameInfo {
        &self.frame
    }

    pub(crate) fn code(&self) -> &CodeInfo {
        &self.code
    }

    pub(crate) fn take_airlock(&self) -> Airlock<Y> {
        std::mem::replace(&mut *self.airlock.borrow_mut(), Airlock::Empty)
    }

    fn park(&self, airlock: Airlock<Y>) {
        *self.airlock.borrow_mut() = airlock;
    }

    /// Report one suspension of this frame to the registered hooks.
    pub(crate) fn suspend(
        &self,
        value: SuspendedValue,
        location: Option<&'static Location<'static>>,
    ) -> Result<(), SuspensionForbidden> {
        let offset = self.suspensions.get();
        self.suspensions.set(offset.wrapping_add(1));
        let event = SuspensionEvent {
            code: &self.code,
            instruction_offset: offset,
            value,
            location,
        };
        monitoring::dispatch(&event)
    }
}

/// Handle a generator body uses to yield values to its driver.
pub struct Co<Y> {
    shared: Rc<Shared<Y>>,
}

impl<Y> Co<Y> {
    pub(crate) fn new(shared: Rc<Shared<Y>>) -> Self {
        Co { shared }
    }

    /// Suspend the generator, handing `value` to whoever resumed it.
    #[track_caller]
    pub fn yield_(&self, value: Y) -> Yield<Y> {
        Yield {
            shared: Rc::clone(&self.shared),
            value: Some(value),
            location: Location::caller(),
        }
    }

    /// Identity of the generator's frame.
    pub fn frame(&self) -> FrameId {
        self.shared.frame.id()
    }
}

impl<Y> fmt::Debug for Co<Y> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Co")
            .field("frame", &self.shared.frame.id())
            .field("code", &self.shared.code.name())
            .finish()
    }
}

/// Future returned by [`Co::yield_`].
#[must_use = "nothing is yielded unless the future is awaited"]
pub struct Yield<Y> {
    shared: Rc<Shared<Y>>,
    value: Option<Y>,
    location: &'static Location<'static>,
}

// The value is moved out by `Option::take`, never pinned in place.
impl<Y> Unpin for Yield<Y> {}

impl<Y> Future for Yield<Y> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let Some(value) = this.value.take() else {
            return Poll::Ready(());
        };

        let marker = if this.shared.code.is_async_generator() {
            SuspendedValue::Wrapped {
                type_name: type_name::<Y>(),
            }
        } else {
            SuspendedValue::Value {
                type_name: type_name::<Y>(),
            }
        };
        let airlock = match this.shared.suspend(marker, Some(this.location)) {
            Ok(()) => Airlock::Yielded(value),
            Err(err) => Airlock::Rejected(err),
        };
        this.shared.park(airlock);
        Poll::Pending
    }
}
