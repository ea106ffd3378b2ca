//! Content resolution collaborators.
//!
//! [`ContentResolver`] is offered every appended item that has no explicit
//! type. [`PropBackend`] hands out `prop:` URLs for sub-model nodes so a host
//! can navigate into them later.

use crate::graph::{Prop, PropGraph, PropId};

/// URL scheme used for graph-backed sub-models.
pub const PROP_SCHEME: &str = "prop:";

/// Resolves untyped item URLs.
pub trait ContentResolver: Send + Sync {
    /// Return `true` if the resolver took over `url`. The item node is then
    /// discarded by the caller.
    fn resolve_item(&self, url: &str, node: &Prop) -> bool;
}

/// Resolver that never claims anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl ContentResolver for NoResolver {
    fn resolve_item(&self, _url: &str, _node: &Prop) -> bool {
        false
    }
}

impl<F> ContentResolver for F
where
    F: Fn(&str, &Prop) -> bool + Send + Sync,
{
    fn resolve_item(&self, url: &str, node: &Prop) -> bool {
        self(url, node)
    }
}

/// Maps nodes to `prop:<id>` URLs and back.
#[derive(Clone)]
pub struct PropBackend {
    graph: PropGraph,
}

impl PropBackend {
    pub fn new(graph: PropGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &PropGraph {
        &self.graph
    }

    pub fn make_url(&self, node: &Prop) -> String {
        format!("{PROP_SCHEME}{}", node.id())
    }

    pub fn handles(&self, url: &str) -> bool {
        url.starts_with(PROP_SCHEME)
    }

    /// Resolve a `prop:` URL to its node, if it is still alive.
    pub fn open(&self, url: &str) -> Option<Prop> {
        let id: PropId = url.strip_prefix(PROP_SCHEME)?.parse().ok()?;
        self.graph.lookup(id)
    }
}
