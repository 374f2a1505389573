//! Error types for scopes, generator drivers and configuration.

use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::event::SuspensionEvent;
use crate::scope::ForbidState;

/// A suspension point was reached inside a scope that forbids it.
///
/// Displays as exactly the reason given when the scope was opened.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct SuspensionForbidden {
    reason: Arc<str>,
    code_name: Option<Arc<str>>,
    instruction_offset: Option<u32>,
    suspend_location: Option<&'static Location<'static>>,
    scope_location: Option<&'static Location<'static>>,
}

impl SuspensionForbidden {
    /// A bare rejection, for hooks other than the built-in filter.
    pub fn new(reason: impl Into<Arc<str>>) -> Self {
        SuspensionForbidden {
            reason: reason.into(),
            code_name: None,
            instruction_offset: None,
            suspend_location: None,
            scope_location: None,
        }
    }

    pub(crate) fn from_scope(state: &ForbidState, event: &SuspensionEvent<'_>) -> Self {
        SuspensionForbidden {
            reason: state.reason_arc().unwrap_or_else(|| Arc::from("")),
            code_name: Some(event.code.name_arc()),
            instruction_offset: Some(event.instruction_offset),
            suspend_location: event.location,
            scope_location: Some(state.location()),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Name of the generator whose suspension was rejected.
    pub fn code_name(&self) -> Option<&str> {
        self.code_name.as_deref()
    }

    pub fn instruction_offset(&self) -> Option<u32> {
        self.instruction_offset
    }

    /// Where the rejected `yield_` was written.
    pub fn suspend_location(&self) -> Option<&'static Location<'static>> {
        self.suspend_location
    }

    /// Where the forbidding scope was opened.
    pub fn scope_location(&self) -> Option<&'static Location<'static>> {
        self.scope_location
    }
}

/// Failure of a generator drive operation.
#[derive(Debug, Clone, Error)]
pub enum GuardError {
    #[error(transparent)]
    Forbidden(#[from] SuspensionForbidden),
    #[error("generator `{name}` awaited a future that is not its own yield")]
    ForeignAwait { name: Arc<str> },
    #[error("generator `{name}` already finished")]
    Exhausted { name: Arc<str> },
}

impl GuardError {
    pub fn as_forbidden(&self) -> Option<&SuspensionForbidden> {
        match self {
            GuardError::Forbidden(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, GuardError::Forbidden(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown suspension event kind `{0}` (expected `yield` or `await`)")]
    UnknownEvent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_displays_reason_only() {
        let err = SuspensionForbidden::new("holding a lock");
        assert_eq!(err.to_string(), "holding a lock");
        assert!(err.code_name().is_none());
        assert!(err.scope_location().is_none());
    }

    #[test]
    fn test_guard_error_display() {
        let err = GuardError::from(SuspensionForbidden::new("nope"));
        assert_eq!(err.to_string(), "nope");
        assert!(err.is_forbidden());
        assert_eq!(err.as_forbidden().map(|f| f.reason()), Some("nope"));

        let err = GuardError::Exhausted {
            name: Arc::from("gen"),
        };
        assert!(err.to_string().contains("`gen` already finished"));
        assert!(err.as_forbidden().is_none());
    }

    #[test]
    fn test_unknown_event_display() {
        let err = ConfigError::UnknownEvent("resume".to_string());
        assert!(err.to_string().contains("`resume`"));
    }
}
