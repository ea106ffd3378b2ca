//! Search registry and search-class grouping nodes
//!
//! Searchers are unordered. A query fans out to every searcher, and each
//! one gets its own search class: a grouping node under the search page
//! carrying the searcher's title and icon, with its own `nodes` and
//! `entries` children.

use crate::graph::Prop;

/// Identifier of a registered searcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SearcherId(u64);

/// A registered search handler with its display metadata
#[derive(Debug, Clone)]
pub struct Searcher<H> {
    pub id: SearcherId,
    pub title: String,
    pub icon: Option<String>,
    pub owner: String,
    pub handler: H,
}

/// Set of searchers
pub struct SearchRegistry<H> {
    searchers: Vec<Searcher<H>>,
    next_id: u64,
}

impl<H: Clone> SearchRegistry<H> {
    pub fn new() -> Self {
        Self {
            searchers: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, title: &str, icon: Option<&str>, handler: H, owner: &str) -> SearcherId {
        let id = SearcherId(self.next_id);
        self.next_id += 1;
        tracing::debug!(title, owner, "searcher added");
        self.searchers.push(Searcher {
            id,
            title: title.to_string(),
            icon: icon.map(str::to_string),
            owner: owner.to_string(),
            handler,
        });
        id
    }

    pub fn remove(&mut self, id: SearcherId) -> Option<H> {
        let idx = self.searchers.iter().position(|s| s.id == id)?;
        Some(self.searchers.remove(idx).handler)
    }

    /// Remove every searcher registered by `owner`, returning their handlers
    pub fn remove_owned_by(&mut self, owner: &str) -> Vec<H> {
        let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.searchers)
            .into_iter()
            .partition(|s| s.owner == owner);
        self.searchers = kept;
        gone.into_iter().map(|s| s.handler).collect()
    }

    /// Copy of the searchers whose owner `accept`s them
    pub fn snapshot_with(&self, mut accept: impl FnMut(&str) -> bool) -> Vec<Searcher<H>> {
        self.searchers
            .iter()
            .filter(|s| accept(&s.owner))
            .cloned()
            .collect()
    }

    pub fn owner_of(&self, id: SearcherId) -> Option<&str> {
        self.searchers
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.owner.as_str())
    }

    pub fn count_owned_by(&self, owner: &str) -> usize {
        self.searchers.iter().filter(|s| s.owner == owner).count()
    }

    pub fn len(&self) -> usize {
        self.searchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.searchers.is_empty()
    }
}

impl<H: Clone> Default for SearchRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Grouping node for one searcher's results
#[derive(Debug, Clone)]
pub struct SearchClass {
    pub root: Prop,
    /// Result items
    pub nodes: Prop,
    /// Result count
    pub entries: Prop,
}

/// Append a search class under `parent`.
pub fn create_search_class(parent: &Prop, title: &str, icon: Option<&str>) -> SearchClass {
    let root = parent.add_child();
    root.create_child("type").set_string("directory");

    let metadata = root.create_child("metadata");
    metadata.create_child("title").set_string(title);
    if let Some(icon) = icon {
        metadata.create_child("icon").set_string(icon);
    }

    let nodes = root.create_child("nodes");
    let entries = root.create_child("entries");
    entries.set_int(0);

    SearchClass {
        root,
        nodes,
        entries,
    }
}
