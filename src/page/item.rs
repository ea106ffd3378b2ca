//! Items appended to a model's `items` collection.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BridgeError, BridgeResult};
use crate::graph::{Event, NotifyKinds, Prop, Subscription};
use crate::sandbox::{ScriptContext, ScriptValue};

use super::events::{dispatch_event, EventHandlerList};
use super::model::ModelObject;
use super::session::SubTarget;

#[derive(Default)]
struct ItemState {
    handlers: EventHandlerList,
    event_sub: Option<Subscription>,
}

pub(crate) struct Item {
    model: ModelObject,
    root: Prop,
    state: Mutex<ItemState>,
}

impl Item {
    pub(super) fn on_event(self: &Arc<Self>, cx: &mut dyn ScriptContext, event: &Event) {
        let this = ScriptValue::Item(ItemObject(Arc::clone(self)));
        dispatch_event(cx, event, &this, |action| self.state.lock().handlers.find(action));
    }

    /// Tear down handlers after the item's node was destroyed.
    pub(super) fn finish_events(&self) {
        let (handlers, sub) = {
            let mut state = self.state.lock();
            (
                std::mem::take(&mut state.handlers),
                state.event_sub.take(),
            )
        };
        drop(sub);
        drop(handlers);
        self.model.model().end_sub();
    }
}

impl Drop for Item {
    fn drop(&mut self) {
        debug_assert!(
            self.state.get_mut().handlers.is_empty(),
            "item reclaimed with live event handlers"
        );
    }
}

/// Script-visible handle to an item.
#[derive(Clone)]
pub struct ItemObject(Arc<Item>);

impl ItemObject {
    pub(super) fn new(model: ModelObject, root: Prop) -> Self {
        ItemObject(Arc::new(Item {
            model,
            root,
            state: Mutex::new(ItemState::default()),
        }))
    }

    /// Register a handler for `action` on this item.
    ///
    /// The first registration subscribes to the item node for destroy and
    /// external-event notifications on the owning session.
    pub fn on_event(&self, action: &str, handler: &ScriptValue) -> BridgeResult<()> {
        let func = handler
            .as_function()
            .cloned()
            .ok_or_else(|| BridgeError::Argument("Argument is not a function".to_string()))?;

        let item = &self.0;
        let mut state = item.state.lock();
        if state.event_sub.is_none() {
            let model = item.model.model();
            model.begin_sub();
            state.event_sub = Some(model.link().register(
                &item.root,
                NotifyKinds::DESTROYED | NotifyKinds::EXT_EVENT,
                SubTarget::ItemEvents(Arc::clone(item)),
            ));
        }
        state.handlers.register(action, func);
        Ok(())
    }

    /// Destroy the item's node. Handlers are torn down by the resulting
    /// destroy notification.
    pub fn destroy(&self) {
        self.0.root.destroy();
    }

    pub fn root(&self) -> &Prop {
        &self.0.root
    }

    pub fn url(&self) -> Option<String> {
        self.0
            .root
            .child("url")
            .and_then(|u| u.value().as_str().map(str::to_string))
    }

    pub fn handler_count(&self) -> usize {
        self.0.state.lock().handlers.len()
    }
}
