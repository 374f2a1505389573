//! Process-wide registry of suspension hooks.
//!
//! Generator drivers call [`dispatch`] synchronously at every suspension
//! point, before control returns to whoever resumed them. Hooks subscribe to
//! a set of event kinds and either return normally (the suspension proceeds)
//! or fail it with a [`SuspensionForbidden`].

use std::fmt;
use std::sync::Arc;

use log::debug;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::SuspensionForbidden;
use crate::event::{EventSet, SuspensionEvent};
use crate::ids::HookId;

pub type SuspensionHook =
    dyn Fn(&SuspensionEvent<'_>) -> Result<(), SuspensionForbidden> + Send + Sync;

#[derive(Clone)]
struct HookEntry {
    id: HookId,
    name: Arc<str>,
    events: EventSet,
    hook: Arc<SuspensionHook>,
}

impl fmt::Debug for HookEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("events", &self.events)
            .finish()
    }
}

// Copy-on-write: dispatch clones the Arc and never runs hooks under the lock.
static REGISTRY: Lazy<RwLock<Arc<Vec<HookEntry>>>> =
    Lazy::new(|| RwLock::new(Arc::new(Vec::new())));

/// Keeps a hook registered until dropped.
#[must_use = "the hook is unregistered as soon as the registration is dropped"]
#[derive(Debug)]
pub struct HookRegistration {
    id: HookId,
    name: Arc<str>,
}

impl HookRegistration {
    pub fn id(&self) -> HookId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for HookRegistration {
    fn drop(&mut self) {
        let mut registry = REGISTRY.write();
        let mut hooks = (**registry).clone();
        hooks.retain(|entry| entry.id != self.id);
        *registry = Arc::new(hooks);
        debug!("unregistered suspension hook `{}`", self.name);
    }
}

pub fn register_hook<F>(name: &str, events: EventSet, hook: F) -> HookRegistration
where
    F: Fn(&SuspensionEvent<'_>) -> Result<(), SuspensionForbidden> + Send + Sync + 'static,
{
    let entry = HookEntry {
        id: HookId::fresh(),
        name: Arc::from(name),
        events,
        hook: Arc::new(hook),
    };
    let registration = HookRegistration {
        id: entry.id,
        name: Arc::clone(&entry.name),
    };

    let mut registry = REGISTRY.write();
    let mut hooks = (**registry).clone();
    hooks.push(entry);
    *registry = Arc::new(hooks);
    debug!("registered suspension hook `{name}` for {events:?}");

    registration
}

/// Deliver `event` to every subscribed hook in registration order. The first
/// rejection wins and later hooks are not called.
pub fn dispatch(event: &SuspensionEvent<'_>) -> Result<(), SuspensionForbidden> {
    let hooks = REGISTRY.read().clone();
    let kind = EventSet::from(event.kind());
    for entry in hooks.iter().filter(|entry| entry.events.intersects(kind)) {
        (entry.hook)(event)?;
    }
    Ok(())
}

/// Names of the currently registered hooks, in registration order.
pub fn registered_hooks() -> Vec<String> {
    REGISTRY
        .read()
        .iter()
        .map(|entry| entry.name.to_string())
        .collect()
}
