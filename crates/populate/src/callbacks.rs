//! # Callback Registry
//!
//! Hooks are stored per event name in registration order. An event name is
//! free-form (`before_save`, `after_validate`, `publish`, ...); [`before`] and
//! [`after`] build the conventional `before_<event>` / `after_<event>` names.
//!
//! Dispatching lives on the document ([`Document::exec_callback`]): firing an
//! event with no registered hooks is a no-op, otherwise hooks run in order and
//! each one receives the event name.
//!
//! ## Built-in Wiring
//!
//! Every schema starts with the same registry (see
//! [`crate::document::lifecycle::install`]), so these always run before hooks
//! appended by the schema author:
//!
//! | Event | Hooks |
//! |-------|-------|
//! | `before_save`/`create`/`update`/`delete` | re-dispatch on nested documents |
//! | `after_save`/`create`/`update`/`delete` | re-dispatch on nested documents |
//! | `before_create` | assign identity, default positions |
//! | `after_create` | clear `is_new` |
//! | `after_save` | snapshot, invalidate distinct cache |
//! | `before_delete` | cascade dependent relationships, delete attachments |
//! | `after_delete` | mark detached, invalidate distinct cache |
//!
//! [`Document::exec_callback`]: crate::document::Document::exec_callback

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::document::Document;
use crate::error::Result;
use crate::repository::Context;

/// Lifecycle events that propagate into nested documents.
pub const RECURSIVE_EVENTS: [&str; 4] = ["save", "create", "update", "delete"];

pub type HookFn = Arc<dyn Fn(&mut Document, &Context<'_>, &str) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub enum Callback {
    Hook(HookFn),
    /// Fires the same event on every nested document, depth first
    RecurseNested,
}

impl Callback {
    pub fn hook<F>(f: F) -> Self
    where
        F: Fn(&mut Document, &Context<'_>, &str) -> Result<()> + Send + Sync + 'static,
    {
        Callback::Hook(Arc::new(f))
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Hook(_) => f.write_str("Hook(..)"),
            Callback::RecurseNested => f.write_str("RecurseNested"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    Append,
    Prepend,
}

pub fn before(event: &str) -> String {
    format!("before_{}", event)
}

pub fn after(event: &str) -> String {
    format!("after_{}", event)
}

#[derive(Debug, Clone, Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, Vec<Callback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, event: &str, callback: Callback, placement: Placement) {
        let list = self.callbacks.entry(event.to_string()).or_default();
        match placement {
            Placement::Append => list.push(callback),
            Placement::Prepend => list.insert(0, callback),
        }
    }

    pub fn before(&mut self, event: &str, callback: Callback) {
        self.register(&before(event), callback, Placement::Append);
    }

    pub fn after(&mut self, event: &str, callback: Callback) {
        self.register(&after(event), callback, Placement::Append);
    }

    /// Hooks for an event in execution order (empty when none are registered).
    pub fn handlers(&self, event: &str) -> &[Callback] {
        self.callbacks
            .get(event)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_registered(&self, event: &str) -> bool {
        !self.handlers(event).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Callback {
        Callback::hook(|_, _, _| Ok(()))
    }

    #[test]
    fn unknown_event_has_no_handlers() {
        let registry = CallbackRegistry::new();
        assert!(registry.handlers("before_publish").is_empty());
        assert!(!registry.is_registered("before_publish"));
    }

    #[test]
    fn before_and_after_build_event_names() {
        let mut registry = CallbackRegistry::new();
        registry.before("publish", noop());
        registry.after("publish", Callback::RecurseNested);
        assert_eq!(registry.handlers("before_publish").len(), 1);
        assert!(matches!(
            registry.handlers("after_publish")[0],
            Callback::RecurseNested
        ));
    }

    #[test]
    fn prepend_goes_first() {
        let mut registry = CallbackRegistry::new();
        registry.register("before_save", noop(), Placement::Append);
        registry.register("before_save", Callback::RecurseNested, Placement::Prepend);
        let handlers = registry.handlers("before_save");
        assert_eq!(handlers.len(), 2);
        assert!(matches!(handlers[0], Callback::RecurseNested));
        assert!(matches!(handlers[1], Callback::Hook(_)));
    }
}
