//! Suspension events as seen by monitoring hooks.

use std::panic::Location;
use std::str::FromStr;
use std::sync::Arc;

use bitflags::bitflags;
use serde::Deserialize;

use crate::error::ConfigError;

bitflags! {
    /// Kind of code that is suspending.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CodeFlags: u32 {
        const GENERATOR = 1 << 0;
        const ASYNC_GENERATOR = 1 << 1;
    }
}

bitflags! {
    /// Set of event kinds a hook subscribes to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventSet: u32 {
        const YIELD = 1 << 0;
        const AWAIT = 1 << 1;
    }
}

/// Descriptor of the unit of code a suspension happens in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeInfo {
    name: Arc<str>,
    flags: CodeFlags,
}

impl CodeInfo {
    pub fn new(name: impl Into<Arc<str>>, flags: CodeFlags) -> Self {
        CodeInfo {
            name: name.into(),
            flags,
        }
    }

    pub fn generator(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, CodeFlags::GENERATOR)
    }

    pub fn async_generator(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, CodeFlags::ASYNC_GENERATOR)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn flags(&self) -> CodeFlags {
        self.flags
    }

    pub fn is_generator(&self) -> bool {
        self.flags.contains(CodeFlags::GENERATOR)
    }

    pub fn is_async_generator(&self) -> bool {
        self.flags.contains(CodeFlags::ASYNC_GENERATOR)
    }
}

/// What the suspending code handed to its driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendedValue {
    /// A synchronous generator yielding its value directly.
    Value { type_name: &'static str },
    /// An async generator's true yield, wrapped so it is distinguishable
    /// from the await traffic flowing through the same frame.
    Wrapped { type_name: &'static str },
    /// An async generator suspended on a plain await.
    Await,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Yield,
    Await,
}

impl FromStr for EventKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yield" => Ok(EventKind::Yield),
            "await" => Ok(EventKind::Await),
            other => Err(ConfigError::UnknownEvent(other.to_string())),
        }
    }
}

impl From<EventKind> for EventSet {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Yield => EventSet::YIELD,
            EventKind::Await => EventSet::AWAIT,
        }
    }
}

/// One suspension, delivered synchronously to every subscribed hook before
/// control returns to the driver.
#[derive(Debug, Clone, Copy)]
pub struct SuspensionEvent<'a> {
    pub code: &'a CodeInfo,
    /// Ordinal of this suspension within the frame's lifetime.
    pub instruction_offset: u32,
    pub value: SuspendedValue,
    pub location: Option<&'static Location<'static>>,
}

impl<'a> SuspensionEvent<'a> {
    pub fn new(code: &'a CodeInfo, instruction_offset: u32, value: SuspendedValue) -> Self {
        SuspensionEvent {
            code,
            instruction_offset,
            value,
            location: None,
        }
    }

    pub fn at(mut self, location: &'static Location<'static>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn kind(&self) -> EventKind {
        match self.value {
            SuspendedValue::Await => EventKind::Await,
            SuspendedValue::Value { .. } | SuspendedValue::Wrapped { .. } => EventKind::Yield,
        }
    }

    /// Whether this event hands a value to the consumer, as opposed to an
    /// await passing through the frame.
    ///
    /// Async generators only count when the value carries the wrapper
    /// marker; synchronous generators surface the value itself.
    pub fn is_true_yield(&self) -> bool {
        if self.code.is_async_generator() {
            matches!(self.value, SuspendedValue::Wrapped { .. })
        } else if self.code.is_generator() {
            matches!(self.value, SuspendedValue::Value { .. })
        } else {
            false
        }
    }
}
