//! Event handler lists and dispatch.

use std::collections::VecDeque;

use crate::graph::Event;
use crate::sandbox::{call_reporting, ScriptContext, ScriptFunction, ScriptValue};

struct EventHandler {
    action: String,
    func: ScriptFunction,
}

/// Handlers registered through `onEvent`, newest first.
#[derive(Default)]
pub(crate) struct EventHandlerList {
    handlers: VecDeque<EventHandler>,
}

impl EventHandlerList {
    pub(crate) fn register(&mut self, action: &str, func: ScriptFunction) {
        self.handlers.push_front(EventHandler {
            action: action.to_string(),
            func,
        });
    }

    /// The most recently registered handler for `action`.
    pub(crate) fn find(&self, action: &str) -> Option<ScriptFunction> {
        self.handlers
            .iter()
            .find(|h| h.action == action)
            .map(|h| h.func.clone())
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Fire the first matching handler for each action carried by `event`.
///
/// `lookup` is called once per action and must not hold locks across the
/// returned function's invocation. Returns the number of handlers fired.
pub(crate) fn dispatch_event(
    cx: &mut dyn ScriptContext,
    event: &Event,
    this: &ScriptValue,
    mut lookup: impl FnMut(&str) -> Option<ScriptFunction>,
) -> usize {
    let mut fired = 0;
    for action in event.action_names() {
        if let Some(func) = lookup(action) {
            call_reporting(cx, &func, this, Vec::new());
            fired += 1;
        }
    }
    fired
}
