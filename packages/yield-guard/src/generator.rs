//! Synchronous generators.

use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::task::noop_waker;

use crate::context::{EnteredSlot, ForbidSlot};
use crate::coroutine::{Airlock, Co, Shared};
use crate::error::GuardError;
use crate::event::CodeInfo;
use crate::frame::{ActiveFrame, FrameInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorStep<Y, R> {
    Yield(Y),
    Return(R),
}

/// A generator whose only suspension point is [`Co::yield_`].
///
/// Each [`resume`](Generator::resume) runs the body with the generator's
/// frame pushed until it yields or returns. A rejected yield fails the
/// resume; the body is dropped on the spot, so every scope it held is
/// restored before the error reaches the caller.
///
/// The generator keeps its own forbid slot, starting from a copy of its
/// creator's state. A scope held across a yield stays with the generator and
/// never shows through to whoever resumed it.
pub struct Generator<'a, Y, R = ()> {
    shared: Rc<Shared<Y>>,
    slot: ForbidSlot,
    body: Option<Pin<Box<dyn Future<Output = R> + 'a>>>,
}

impl<'a, Y, R> Generator<'a, Y, R> {
    #[track_caller]
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, producer: F) -> Self
    where
        F: FnOnce(Co<Y>) -> Fut,
        Fut: Future<Output = R> + 'a,
    {
        let name = name.into();
        let frame = FrameInfo::new(Arc::clone(&name), Location::caller());
        let shared = Rc::new(Shared::new(frame, CodeInfo::generator(name)));
        let body = producer(Co::new(Rc::clone(&shared)));
        Generator {
            shared,
            slot: ForbidSlot::inherit(),
            body: Some(Box::pin(body)),
        }
    }

    pub fn frame(&self) -> &FrameInfo {
        self.shared.frame()
    }

    pub fn is_finished(&self) -> bool {
        self.body.is_none()
    }

    pub fn resume(&mut self) -> Result<GeneratorStep<Y, R>, GuardError> {
        let Some(body) = self.body.as_mut() else {
            return Err(GuardError::Exhausted {
                name: self.shared.code().name_arc(),
            });
        };

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let _slot = EnteredSlot::enter(&mut self.slot);
        let outcome = {
            let _active = ActiveFrame::enter(self.shared.frame());
            body.as_mut().poll(&mut cx)
        };

        match outcome {
            Poll::Ready(value) => {
                self.body = None;
                Ok(GeneratorStep::Return(value))
            }
            Poll::Pending => match self.shared.take_airlock() {
                Airlock::Yielded(value) => Ok(GeneratorStep::Yield(value)),
                Airlock::Rejected(err) => {
                    self.body = None;
                    Err(err.into())
                }
                Airlock::Empty => {
                    self.body = None;
                    Err(GuardError::ForeignAwait {
                        name: self.shared.code().name_arc(),
                    })
                }
            },
        }
    }
}

impl<Y, R> Drop for Generator<'_, Y, R> {
    fn drop(&mut self) {
        if self.body.is_some() {
            let _slot = EnteredSlot::enter(&mut self.slot);
            self.body = None;
        }
    }
}

impl<Y, R> Iterator for Generator<'_, Y, R> {
    type Item = Result<Y, GuardError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_finished() {
            return None;
        }
        match self.resume() {
            Ok(GeneratorStep::Yield(value)) => Some(Ok(value)),
            Ok(GeneratorStep::Return(_)) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

impl<Y, R> fmt::Debug for Generator<'_, Y, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("name", &self.shared.code().name())
            .field("frame", &self.shared.frame().id())
            .field("finished", &self.body.is_none())
            .finish()
    }
}
