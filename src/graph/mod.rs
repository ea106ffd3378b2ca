//! Observable property graph.
//!
//! The graph is a tree of named nodes, each holding a [`PropValue`]. Observers
//! subscribe to a node with a set of [`NotifyKinds`] and a [`Courier`]; every
//! matching change is posted to that courier and nowhere else.
//!
//! # Ownership
//!
//! ```text
//! PropGraph ── Arc<GraphShared> ── Mutex<GraphState>
//!                                   ├── nodes: PropId -> Node
//!                                   └── subscriptions: SubscriptionId -> SubEntry
//! Prop ── Arc<Handle> (counts as one reference on its node)
//! ```
//!
//! A node is reclaimed once it is destroyed and no [`Prop`] handle refers to
//! it. A node that was never attached is destroyed when its last handle drops,
//! so discarded nodes never leak.
//!
//! The graph never drops a `Prop` or `Subscription` while holding its state
//! lock; both take that lock in their `Drop` impls.

mod courier;
mod event;
mod filter;
mod value;

pub use courier::{Courier, NotifyBatch};
pub use event::{Action, Event};
pub use filter::create_filter_view;
pub use value::PropValue;

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;
use thiserror::Error;

/// Identifier of a node, unique within its graph.
pub type PropId = u64;

/// Identifier of a subscription, unique within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

bitflags! {
    /// Notification kinds tracked by a subscription.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NotifyKinds: u32 {
        const VALUE = 1 << 0;
        const CHILDREN = 1 << 1;
        const DESTROYED = 1 << 2;
        const EXT_EVENT = 1 << 3;
        const WANT_MORE_CHILDREN = 1 << 4;
        const HAVE_MORE_CHILDREN = 1 << 5;
        /// Deliver through the courier's expedited class.
        const EXPEDITE = 1 << 31;
    }
}

/// A change posted to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum PropEvent {
    Value(PropValue),
    ChildAdded(PropId),
    ChildRemoved(PropId),
    /// The observer is ready for more children.
    WantMoreChildren,
    /// The producer appended more children.
    HaveMoreChildren,
    ExtEvent(Arc<Event>),
    Destroyed,
}

impl PropEvent {
    pub fn kind(&self) -> NotifyKinds {
        match self {
            PropEvent::Value(_) => NotifyKinds::VALUE,
            PropEvent::ChildAdded(_) | PropEvent::ChildRemoved(_) => NotifyKinds::CHILDREN,
            PropEvent::WantMoreChildren => NotifyKinds::WANT_MORE_CHILDREN,
            PropEvent::HaveMoreChildren => NotifyKinds::HAVE_MORE_CHILDREN,
            PropEvent::ExtEvent(_) => NotifyKinds::EXT_EVENT,
            PropEvent::Destroyed => NotifyKinds::DESTROYED,
        }
    }
}

/// A queued notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub subscription: SubscriptionId,
    pub node: PropId,
    pub event: PropEvent,
}

/// Why a node could not be attached.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachError {
    #[error("parent node {0} is destroyed")]
    ParentDestroyed(PropId),

    #[error("node {0} is destroyed")]
    NodeDestroyed(PropId),

    #[error("attaching node {0} would create a cycle")]
    Cycle(PropId),

    #[error("nodes belong to different graphs")]
    ForeignGraph,
}

pub(crate) struct Node {
    pub(crate) name: Option<String>,
    pub(crate) value: PropValue,
    pub(crate) parent: Option<PropId>,
    pub(crate) children: Vec<PropId>,
    subscriptions: Vec<SubscriptionId>,
    handles: usize,
    pub(crate) destroyed: bool,
    pub(crate) view: Option<filter::FilterView>,
}

struct SubEntry {
    node: PropId,
    kinds: NotifyKinds,
    courier: Courier,
}

pub(crate) struct GraphState {
    pub(crate) nodes: HashMap<PropId, Node>,
    subscriptions: HashMap<SubscriptionId, SubEntry>,
    next_node: PropId,
    next_sub: u64,
    root: PropId,
}

fn deliver(
    courier: &Courier,
    subscription: SubscriptionId,
    node: PropId,
    event: PropEvent,
    expedite: bool,
) {
    courier.post(
        Notification {
            subscription,
            node,
            event,
        },
        expedite,
    );
}

impl GraphState {
    fn new() -> Self {
        let mut state = Self {
            nodes: HashMap::new(),
            subscriptions: HashMap::new(),
            next_node: 1,
            next_sub: 1,
            root: 0,
        };
        let root = state.alloc(Some("global".to_string()), None);
        // Pinned: the global root is never reclaimed.
        if let Some(node) = state.nodes.get_mut(&root) {
            node.handles = 1;
        }
        state.root = root;
        state
    }

    fn is_destroyed(&self, id: PropId) -> bool {
        self.nodes.get(&id).map_or(true, |n| n.destroyed)
    }

    fn alloc(&mut self, name: Option<String>, parent: Option<PropId>) -> PropId {
        let id = self.next_node;
        self.next_node += 1;

        // Children created under a destroyed parent are born destroyed.
        let zombie = parent.is_some_and(|p| self.is_destroyed(p));
        let parent = if zombie { None } else { parent };

        self.nodes.insert(
            id,
            Node {
                name,
                value: PropValue::Void,
                parent,
                children: Vec::new(),
                subscriptions: Vec::new(),
                handles: 0,
                destroyed: zombie,
                view: None,
            },
        );

        if let Some(p) = parent {
            if let Some(node) = self.nodes.get_mut(&p) {
                node.children.push(id);
            }
            self.notify(p, PropEvent::ChildAdded(id));
        }
        id
    }

    pub(crate) fn child_named(&self, parent: PropId, name: &str) -> Option<PropId> {
        self.nodes.get(&parent)?.children.iter().copied().find(|c| {
            self.nodes
                .get(c)
                .and_then(|n| n.name.as_deref())
                .is_some_and(|n| n == name)
        })
    }

    fn find_or_create(&mut self, parent: PropId, name: &str) -> PropId {
        match self.child_named(parent, name) {
            Some(id) => id,
            None => self.alloc(Some(name.to_string()), Some(parent)),
        }
    }

    fn notify(&self, id: PropId, event: PropEvent) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let kind = event.kind();
        for sub_id in &node.subscriptions {
            if let Some(entry) = self.subscriptions.get(sub_id) {
                if entry.kinds.contains(kind) {
                    deliver(
                        &entry.courier,
                        *sub_id,
                        id,
                        event.clone(),
                        entry.kinds.contains(NotifyKinds::EXPEDITE),
                    );
                }
            }
        }
    }

    fn set_value(&mut self, id: PropId, value: PropValue) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if node.destroyed || node.value == value {
            return;
        }
        node.value = value.clone();
        self.notify(id, PropEvent::Value(value));
    }

    fn attach(&mut self, child: PropId, parent: PropId) -> Result<(), AttachError> {
        if self.is_destroyed(child) {
            return Err(AttachError::NodeDestroyed(child));
        }
        if self.is_destroyed(parent) {
            return Err(AttachError::ParentDestroyed(parent));
        }

        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(AttachError::Cycle(child));
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent);
        }

        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        self.notify(parent, PropEvent::ChildAdded(child));
        Ok(())
    }

    fn detach(&mut self, child: PropId) {
        let parent = self.nodes.get_mut(&child).and_then(|n| n.parent.take());
        if let Some(p) = parent {
            if let Some(node) = self.nodes.get_mut(&p) {
                node.children.retain(|c| *c != child);
            }
            self.notify(p, PropEvent::ChildRemoved(child));
        }
    }

    fn destroy(&mut self, id: PropId) {
        if id == self.root {
            return;
        }
        let children = match self.nodes.get_mut(&id) {
            Some(node) if !node.destroyed => {
                node.destroyed = true;
                std::mem::take(&mut node.children)
            }
            _ => return,
        };

        for child in children {
            if let Some(node) = self.nodes.get_mut(&child) {
                node.parent = None;
            }
            self.destroy(child);
        }

        self.notify(id, PropEvent::Destroyed);
        self.detach(id);

        if self.nodes.get(&id).is_some_and(|n| n.handles == 0) {
            self.nodes.remove(&id);
        }
    }

    fn release_handle(&mut self, id: PropId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.handles = node.handles.saturating_sub(1);
        if node.handles > 0 {
            return;
        }
        if node.destroyed {
            self.nodes.remove(&id);
        } else if node.parent.is_none() && id != self.root {
            self.destroy(id);
        }
    }

    fn subscribe(&mut self, node: PropId, kinds: NotifyKinds, courier: Courier) -> SubscriptionId {
        let id = SubscriptionId(self.next_sub);
        self.next_sub += 1;
        let expedite = kinds.contains(NotifyKinds::EXPEDITE);

        match self.nodes.get_mut(&node) {
            Some(n) if !n.destroyed => {
                n.subscriptions.push(id);
                if kinds.contains(NotifyKinds::VALUE) {
                    deliver(&courier, id, node, PropEvent::Value(n.value.clone()), expedite);
                }
                if kinds.contains(NotifyKinds::CHILDREN) {
                    for child in &n.children {
                        deliver(&courier, id, node, PropEvent::ChildAdded(*child), expedite);
                    }
                }
            }
            _ => {
                if kinds.contains(NotifyKinds::DESTROYED) {
                    deliver(&courier, id, node, PropEvent::Destroyed, expedite);
                }
            }
        }

        self.subscriptions.insert(id, SubEntry { node, kinds, courier });
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        if let Some(entry) = self.subscriptions.remove(&id) {
            if let Some(node) = self.nodes.get_mut(&entry.node) {
                node.subscriptions.retain(|s| *s != id);
            }
        }
    }

    fn dump(&self, id: PropId, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let name = node.name.as_deref().unwrap_or("<anonymous>");
        let _ = if node.view.is_some() {
            writeln!(out, "{indent}{name} [filter view]")
        } else if node.value.is_void() {
            writeln!(out, "{indent}{name}")
        } else {
            writeln!(out, "{indent}{name} = {}", node.value)
        };
        for child in &node.children {
            self.dump(*child, depth + 1, out);
        }
    }
}

struct GraphShared {
    state: Mutex<GraphState>,
}

impl GraphShared {
    fn mint(self: &Arc<Self>, state: &mut GraphState, id: PropId) -> Prop {
        if let Some(node) = state.nodes.get_mut(&id) {
            node.handles += 1;
        }
        Prop {
            handle: Arc::new(Handle {
                id,
                graph: Arc::clone(self),
            }),
        }
    }
}

/// A property graph instance.
#[derive(Clone)]
pub struct PropGraph {
    shared: Arc<GraphShared>,
}

impl PropGraph {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(GraphShared {
                state: Mutex::new(GraphState::new()),
            }),
        }
    }

    /// The global root node.
    pub fn root(&self) -> Prop {
        let mut st = self.shared.state.lock();
        let root = st.root;
        self.shared.mint(&mut st, root)
    }

    /// Create a node with no parent. It is destroyed when its last handle
    /// drops unless it has been attached somewhere first.
    pub fn create_detached(&self) -> Prop {
        let mut st = self.shared.state.lock();
        let id = st.alloc(None, None);
        self.shared.mint(&mut st, id)
    }

    /// Look up a live node by id.
    pub fn lookup(&self, id: PropId) -> Option<Prop> {
        let mut st = self.shared.state.lock();
        if st.is_destroyed(id) {
            return None;
        }
        Some(self.shared.mint(&mut st, id))
    }

    /// Number of nodes still held in memory, including the root.
    pub fn node_count(&self) -> usize {
        self.shared.state.lock().nodes.len()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.state.lock().subscriptions.len()
    }

    pub fn same_graph(&self, other: &PropGraph) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Default for PropGraph {
    fn default() -> Self {
        Self::new()
    }
}

struct Handle {
    id: PropId,
    graph: Arc<GraphShared>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.graph.state.lock().release_handle(self.id);
    }
}

/// A counted reference to a node.
///
/// Cloning shares the reference; the node's reference is released when the
/// last clone drops.
#[derive(Clone)]
pub struct Prop {
    handle: Arc<Handle>,
}

impl Prop {
    pub fn id(&self) -> PropId {
        self.handle.id
    }

    fn shared(&self) -> &Arc<GraphShared> {
        &self.handle.graph
    }

    pub fn graph(&self) -> PropGraph {
        PropGraph {
            shared: Arc::clone(self.shared()),
        }
    }

    /// Get the child called `name`, creating it if missing.
    pub fn create_child(&self, name: &str) -> Prop {
        let shared = self.shared();
        let mut st = shared.state.lock();
        let id = st.find_or_create(self.id(), name);
        shared.mint(&mut st, id)
    }

    /// Append a new anonymous child.
    pub fn add_child(&self) -> Prop {
        let shared = self.shared();
        let mut st = shared.state.lock();
        let id = st.alloc(None, Some(self.id()));
        shared.mint(&mut st, id)
    }

    /// Walk a dotted path, creating missing nodes.
    pub fn create_path(&self, path: &str) -> Prop {
        let shared = self.shared();
        let mut st = shared.state.lock();
        let mut id = self.id();
        for part in path.split('.').filter(|p| !p.is_empty()) {
            id = st.find_or_create(id, part);
        }
        shared.mint(&mut st, id)
    }

    pub fn child(&self, name: &str) -> Option<Prop> {
        let shared = self.shared();
        let mut st = shared.state.lock();
        let id = st.child_named(self.id(), name)?;
        Some(shared.mint(&mut st, id))
    }

    /// Walk a dotted path without creating anything.
    pub fn find(&self, path: &str) -> Option<Prop> {
        let shared = self.shared();
        let mut st = shared.state.lock();
        let mut id = self.id();
        for part in path.split('.').filter(|p| !p.is_empty()) {
            id = st.child_named(id, part)?;
        }
        Some(shared.mint(&mut st, id))
    }

    /// Children in insertion order. Filter views return the matching
    /// children of their source.
    pub fn children(&self) -> Vec<Prop> {
        let shared = self.shared();
        let mut st = shared.state.lock();
        let ids = match st.nodes.get(&self.id()) {
            Some(node) => match &node.view {
                Some(view) => filter::filtered_children(&st, view),
                None => node.children.clone(),
            },
            None => Vec::new(),
        };
        ids.into_iter().map(|id| shared.mint(&mut st, id)).collect()
    }

    pub fn parent(&self) -> Option<Prop> {
        let shared = self.shared();
        let mut st = shared.state.lock();
        let parent = st.nodes.get(&self.id())?.parent?;
        Some(shared.mint(&mut st, parent))
    }

    pub fn name(&self) -> Option<String> {
        self.shared()
            .state
            .lock()
            .nodes
            .get(&self.id())
            .and_then(|n| n.name.clone())
    }

    pub fn value(&self) -> PropValue {
        self.shared()
            .state
            .lock()
            .nodes
            .get(&self.id())
            .map(|n| n.value.clone())
            .unwrap_or_default()
    }

    /// Set the node's value. Writes to destroyed nodes are ignored.
    pub fn set_value(&self, value: impl Into<PropValue>) {
        self.shared().state.lock().set_value(self.id(), value.into());
    }

    pub fn set_string(&self, value: &str) {
        self.set_value(value);
    }

    pub fn set_int(&self, value: i64) {
        self.set_value(value);
    }

    pub fn set_bool(&self, value: bool) {
        self.set_value(value);
    }

    pub fn set_float(&self, value: f64) {
        self.set_value(value);
    }

    pub fn set_void(&self) {
        self.set_value(PropValue::Void);
    }

    /// Attach this node under `parent`, detaching it from any previous
    /// parent. Fails if either node is destroyed.
    pub fn set_parent(&self, parent: &Prop) -> Result<(), AttachError> {
        if !Arc::ptr_eq(self.shared(), parent.shared()) {
            return Err(AttachError::ForeignGraph);
        }
        self.shared().state.lock().attach(self.id(), parent.id())
    }

    /// Destroy this node and its whole subtree.
    pub fn destroy(&self) {
        self.shared().state.lock().destroy(self.id());
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared().state.lock().is_destroyed(self.id())
    }

    /// Subscribe to this node. Notifications go to `courier` only.
    ///
    /// Subscribing to a destroyed node with [`NotifyKinds::DESTROYED`]
    /// immediately queues a `Destroyed` notification.
    pub fn subscribe(&self, kinds: NotifyKinds, courier: &Courier) -> Subscription {
        let id = self
            .shared()
            .state
            .lock()
            .subscribe(self.id(), kinds, courier.clone());
        Subscription {
            id,
            graph: Arc::clone(self.shared()),
        }
    }

    /// Observer side: ask the producer for more children.
    pub fn want_more_children(&self) {
        self.shared()
            .state
            .lock()
            .notify(self.id(), PropEvent::WantMoreChildren);
    }

    /// Producer side: signal that more children were appended.
    pub fn have_more_children(&self) {
        self.shared()
            .state
            .lock()
            .notify(self.id(), PropEvent::HaveMoreChildren);
    }

    /// Observer side: deliver an external event to this node's subscribers.
    pub fn send_event(&self, event: Event) {
        self.shared()
            .state
            .lock()
            .notify(self.id(), PropEvent::ExtEvent(Arc::new(event)));
    }

    /// Render the subtree as an indented listing.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.shared().state.lock().dump(self.id(), 0, &mut out);
        out
    }
}

impl PartialEq for Prop {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id() && Arc::ptr_eq(self.shared(), other.shared())
    }
}

impl Eq for Prop {}

impl fmt::Debug for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prop").field("id", &self.id()).finish()
    }
}

/// An active subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriptionId,
    graph: Arc<GraphShared>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.graph.state.lock().unsubscribe(self.id);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Subscription").field(&self.id).finish()
    }
}
