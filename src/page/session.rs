//! Session runner.
//!
//! Every launched model gets one worker thread. The worker creates a script
//! context, calls the open handler once, then services the model's
//! notification queue until no subscription remains:
//!
//! ```text
//! Spawned -> RunningOpenHandler -> ServicingNotifications -> Draining -> Terminated
//! ```
//!
//! All script code for the model, apart from the open call, runs from
//! [`SessionLink::dispatch`] on this thread. Destroying the model's root
//! node is the only way to stop a session.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::config::SessionConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::graph::{
    Courier, Notification, NotifyKinds, Prop, PropEvent, Subscription, SubscriptionId,
};
use crate::sandbox::{call_reporting, ScriptContext, ScriptRuntime, ScriptValue};

use super::item::Item;
use super::model::{Model, ModelObject};

/// What a subscription on a session's courier is for.
#[derive(Clone)]
pub(crate) enum SubTarget {
    PageEvents(Arc<Model>),
    ItemEvents(Arc<Item>),
    Paginator(Arc<Model>),
}

/// The notification queue shared by a model and its sub-models, plus the
/// subscriptions routed through it.
pub(crate) struct SessionLink {
    courier: Courier,
    live: AtomicUsize,
    targets: Mutex<HashMap<SubscriptionId, SubTarget>>,
}

impl SessionLink {
    pub(crate) fn new() -> Self {
        Self {
            courier: Courier::new(),
            live: AtomicUsize::new(0),
            targets: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn courier(&self) -> &Courier {
        &self.courier
    }

    /// Subscriptions still open on this link.
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Subscribe `node` on this link's courier and route its notifications
    /// to `target`.
    pub(crate) fn register(
        &self,
        node: &Prop,
        kinds: NotifyKinds,
        target: SubTarget,
    ) -> Subscription {
        let mut targets = self.targets.lock();
        let sub = node.subscribe(kinds, &self.courier);
        targets.insert(sub.id(), target);
        self.live.fetch_add(1, Ordering::AcqRel);
        sub
    }

    fn target(&self, id: SubscriptionId) -> Option<SubTarget> {
        self.targets.lock().get(&id).cloned()
    }

    fn finish(&self, id: SubscriptionId) -> Option<SubTarget> {
        let target = self.targets.lock().remove(&id)?;
        self.live.fetch_sub(1, Ordering::AcqRel);
        Some(target)
    }

    /// Route one notification to its handler.
    pub(crate) fn dispatch(&self, cx: &mut dyn ScriptContext, note: Notification) {
        match note.event {
            PropEvent::Destroyed => {
                let Some(target) = self.finish(note.subscription) else {
                    return;
                };
                match &target {
                    SubTarget::PageEvents(model) => model.finish_page_events(),
                    SubTarget::ItemEvents(item) => item.finish_events(),
                    SubTarget::Paginator(model) => model.finish_paginator(),
                }
            }
            PropEvent::ExtEvent(event) => match self.target(note.subscription) {
                Some(SubTarget::PageEvents(model)) => model.on_page_event(cx, &event),
                Some(SubTarget::ItemEvents(item)) => item.on_event(cx, &event),
                _ => {}
            },
            PropEvent::WantMoreChildren => {
                if let Some(SubTarget::Paginator(model)) = self.target(note.subscription) {
                    model.on_want_more(cx);
                }
            }
            _ => {}
        }
    }
}

/// Lifecycle of a session worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Spawned,
    RunningOpenHandler,
    ServicingNotifications,
    Draining,
    Terminated,
}

struct StateCell {
    state: Mutex<SessionState>,
    changed_tx: Sender<SessionState>,
    changed_rx: Receiver<SessionState>,
}

impl StateCell {
    fn new() -> Self {
        let (changed_tx, changed_rx) = unbounded();
        Self {
            state: Mutex::new(SessionState::Spawned),
            changed_tx,
            changed_rx,
        }
    }

    fn get(&self) -> SessionState {
        *self.state.lock()
    }

    fn set(&self, model: u64, next: SessionState) {
        *self.state.lock() = next;
        let _ = self.changed_tx.send(next);
        tracing::debug!(model, state = ?next, "session state");
    }

    /// Wait until the state becomes `wanted`. Only the session handle waits,
    /// so one consumer of the change channel is enough.
    fn wait_for(&self, wanted: SessionState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.get() != wanted {
            if self.changed_rx.recv_deadline(deadline).is_err() {
                return self.get() == wanted;
            }
        }
        true
    }
}

/// Handle to a running session. Dropping it detaches the worker.
pub struct SessionHandle {
    model: u64,
    state: Arc<StateCell>,
    thread: JoinHandle<()>,
}

impl SessionHandle {
    pub fn model_id(&self) -> u64 {
        self.model
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_finished(&self) -> bool {
        self.state() == SessionState::Terminated
    }

    /// Wait up to `timeout` for the session to terminate.
    pub fn wait_terminated(&self, timeout: Duration) -> bool {
        self.state.wait_for(SessionState::Terminated, timeout)
    }

    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("model", &self.model)
            .field("state", &self.state())
            .finish()
    }
}

/// Start a session for `model`.
///
/// The model's loading flag is raised before the worker starts. If the
/// thread cannot be spawned the model reference is dropped.
pub fn launch(
    model: ModelObject,
    runtime: Arc<dyn ScriptRuntime>,
    config: &SessionConfig,
) -> BridgeResult<SessionHandle> {
    model.set_loading(&ScriptValue::Bool(true));

    let id = model.id();
    let state = Arc::new(StateCell::new());
    let cell = Arc::clone(&state);

    let mut builder = thread::Builder::new().name(config.thread_name.clone());
    if let Some(size) = config.stack_size {
        builder = builder.stack_size(size);
    }
    let thread = builder
        .spawn(move || run(model, runtime, cell))
        .map_err(BridgeError::Spawn)?;

    Ok(SessionHandle {
        model: id,
        state,
        thread,
    })
}

fn run(model: ModelObject, runtime: Arc<dyn ScriptRuntime>, state: Arc<StateCell>) {
    let id = model.id();
    let mut cx = runtime.new_context();

    state.set(id, SessionState::RunningOpenHandler);
    if let Some(open) = model.model().take_open() {
        let mut args = Vec::with_capacity(open.args.len() + 1);
        args.push(ScriptValue::Model(model.clone()));
        args.extend(open.args);
        call_reporting(cx.as_mut(), &open.func, &ScriptValue::Undefined, args);
    }

    state.set(id, SessionState::ServicingNotifications);
    let link = Arc::clone(model.model().link());
    while link.live() > 0 {
        let batch = link.courier().wait();
        if batch.is_empty() && link.courier().is_closed() {
            break;
        }
        for note in batch.into_ordered() {
            link.dispatch(cx.as_mut(), note);
        }
    }

    state.set(id, SessionState::Draining);
    drop(model);
    drop(link);
    drop(cx);
    state.set(id, SessionState::Terminated);
}
