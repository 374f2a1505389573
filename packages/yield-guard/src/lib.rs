//! yield-guard: detect and forbid suspension points inside a dynamic scope.
//!
//! A debugging aid for code that must not suspend while some invariant is
//! held (a lock, a half-updated structure, a cancel scope). Opening a scope
//! with [`forbid_suspension`] makes any yield *directly* in the calling frame
//! fail with [`SuspensionForbidden`] until the guard drops.
//!
//! # Architecture
//!
//! - **Scope tracker** ([`scope`]): forbid state per logical execution
//!   context with RAII save/restore, so nested forbid/allow scopes always
//!   unwind exactly. Every generator, and every future wrapped with
//!   [`isolate`], is its own context even when sharing a thread with others.
//! - **Suspension filter** ([`filter`]): the monitoring hook that rejects
//!   true yields in the frame that opened the current forbidding scope.
//! - **Host runtime** ([`generator`], [`async_generator`], [`monitoring`],
//!   [`frame`]): generators with explicit frame identities that report every
//!   suspension to the registered hooks before handing control back.
//!
//! ```
//! use yield_guard::{forbid_suspension, Generator};
//!
//! yield_guard::install();
//!
//! let gen = Generator::new("genfunc", |co| async move {
//!     let _scope = forbid_suspension("holding the registry lock");
//!     co.yield_(1).await;
//! });
//! let err = gen.collect::<Result<Vec<_>, _>>().unwrap_err();
//! assert_eq!(err.to_string(), "holding the registry lock");
//! ```

#[macro_use]
mod trace;

pub mod async_generator;
pub mod config;
mod context;
pub mod coroutine;
pub mod error;
pub mod event;
pub mod filter;
pub mod frame;
pub mod generator;
pub mod ids;
pub mod monitoring;
pub mod scenarios;
pub mod scope;
pub mod task;

// Re-exports for convenience
pub use async_generator::{checkpoint, AsyncGenerator, Checkpoint};
pub use config::GuardConfig;
pub use coroutine::{Co, Yield};
pub use error::{ConfigError, GuardError, SuspensionForbidden};
pub use event::{CodeFlags, CodeInfo, EventKind, EventSet, SuspendedValue, SuspensionEvent};
pub use filter::{check_suspension, install, install_with};
pub use frame::{current_frame, enter_frame, frame_at, FrameGuard, FrameInfo};
pub use generator::{Generator, GeneratorStep};
pub use ids::{FrameId, HookId};
pub use monitoring::{dispatch, register_hook, HookRegistration};
pub use scope::{
    allow_suspension, current_forbid_state, forbid_suspension, is_suspension_forbidden,
    with_suspension_forbidden, with_suspension_forbidden_at, ForbidScope, ForbidState,
};
pub use task::{isolate, Isolated};
