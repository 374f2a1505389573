//! Compile-time gated per-event tracing.

/// Emit a `log::trace!` record for every observed suspension event, only when
/// the `event_trace` Cargo feature is enabled.
///
/// With the feature disabled (default), this macro compiles to a no-op while
/// still type-checking format arguments.
macro_rules! trace_event {
    ($($arg:tt)*) => {{
        #[cfg(feature = "event_trace")]
        {
            log::trace!($($arg)*);
        }
        #[cfg(not(feature = "event_trace"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}
