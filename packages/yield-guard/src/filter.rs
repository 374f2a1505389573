//! Suspension filter: the hook that rejects yields in a forbidding frame.

use log::debug;
use once_cell::sync::OnceCell;

use crate::config::GuardConfig;
use crate::context;
use crate::error::SuspensionForbidden;
use crate::event::SuspensionEvent;
use crate::monitoring::{self, HookRegistration};

/// Decide whether `event` may proceed.
///
/// Runs on the thread that is suspending, with the suspending generator's
/// frame on top of that thread's frame stack. Only a true yield whose frame
/// is exactly the one that opened the current forbidding scope is rejected;
/// generators driven from inside that scope suspend freely.
pub fn check_suspension(event: &SuspensionEvent<'_>) -> Result<(), SuspensionForbidden> {
    context::with_context(|cx| {
        let Some(state) = cx.forbid() else {
            return Ok(());
        };
        if state.is_allowed() {
            return Ok(());
        }

        trace_event!(
            "checking suspension in {} at offset {}: {:?}",
            event.code.name(),
            event.instruction_offset,
            event.value
        );
        if !event.is_true_yield() {
            return Ok(());
        }

        let frame = cx.current_frame();
        if !state.forbids_frame(frame.id()) {
            return Ok(());
        }

        debug!(
            "suspension prevented in {} ({}) at offset {}",
            event.code.name(),
            frame.id(),
            event.instruction_offset
        );
        Err(SuspensionForbidden::from_scope(state, event))
    })
}

static INSTALLED: OnceCell<HookRegistration> = OnceCell::new();

/// Register [`check_suspension`] for the rest of the process, once, with the
/// default configuration. Later calls are no-ops.
pub fn install() {
    INSTALLED.get_or_init(|| install_with(&GuardConfig::default()));
}

/// Register [`check_suspension`] for the events `config` selects, until the
/// returned registration is dropped.
pub fn install_with(config: &GuardConfig) -> HookRegistration {
    monitoring::register_hook(&config.tool_name, config.event_set(), check_suspension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CodeInfo, SuspendedValue};
    use crate::frame::enter_frame;
    use crate::scope::{allow_suspension, forbid_suspension};

    fn value() -> SuspendedValue {
        SuspendedValue::Value { type_name: "i32" }
    }

    fn wrapped() -> SuspendedValue {
        SuspendedValue::Wrapped { type_name: "i32" }
    }

    #[test]
    fn test_no_state_passes() {
        let code = CodeInfo::generator("gen");
        assert!(check_suspension(&SuspensionEvent::new(&code, 0, value())).is_ok());
    }

    #[test]
    fn test_rejects_yield_in_owner_frame() {
        let _frame = enter_frame("owner");
        let _scope = forbid_suspension("no yields here");
        let code = CodeInfo::generator("gen");

        let err = check_suspension(&SuspensionEvent::new(&code, 3, value())).unwrap_err();
        assert_eq!(err.to_string(), "no yields here");
        assert_eq!(err.code_name(), Some("gen"));
        assert_eq!(err.instruction_offset(), Some(3));
        assert!(err.scope_location().is_some());
    }

    #[test]
    fn test_other_frame_passes() {
        let _owner = enter_frame("owner");
        let _scope = forbid_suspension("owner only");
        let _callee = enter_frame("callee");
        let code = CodeInfo::generator("gen");
        assert!(check_suspension(&SuspensionEvent::new(&code, 0, value())).is_ok());
    }

    #[test]
    fn test_allowed_state_passes() {
        let _frame = enter_frame("owner");
        let _scope = forbid_suspension("outer");
        let _allow = allow_suspension();
        let code = CodeInfo::generator("gen");
        assert!(check_suspension(&SuspensionEvent::new(&code, 0, value())).is_ok());
    }

    #[test]
    fn test_async_generator_only_rejects_wrapped_values() {
        let _frame = enter_frame("owner");
        let _scope = forbid_suspension("async");
        let code = CodeInfo::async_generator("agen");

        let awaited = SuspensionEvent::new(&code, 0, SuspendedValue::Await);
        assert!(check_suspension(&awaited).is_ok());
        let unwrapped = SuspensionEvent::new(&code, 1, value());
        assert!(check_suspension(&unwrapped).is_ok());

        let err = check_suspension(&SuspensionEvent::new(&code, 2, wrapped())).unwrap_err();
        assert_eq!(err.reason(), "async");
    }

    #[test]
    fn test_rejection_carries_suspend_location() {
        let _frame = enter_frame("owner");
        let _scope = forbid_suspension("located");
        let code = CodeInfo::generator("gen");
        let here = std::panic::Location::caller();

        let err = check_suspension(&SuspensionEvent::new(&code, 0, value()).at(here)).unwrap_err();
        assert_eq!(err.suspend_location(), Some(here));
    }
}
