//! Filtered views over a node's children.
//!
//! A view node mirrors the children of a source node, keeping only those
//! whose label fuzzy-matches the string held by a filter node. The label is
//! the child's `metadata.title`, falling back to its `url`. Views are
//! evaluated when read, so they always reflect the current source.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use super::{GraphState, Prop, PropId};

#[derive(Debug, Clone, Copy)]
pub(crate) struct FilterView {
    pub(crate) source: PropId,
    pub(crate) filter: PropId,
}

/// Make `view` a filtered mirror of `source`, controlled by `filter`.
pub fn create_filter_view(view: &Prop, source: &Prop, filter: &Prop) {
    let shared = view.shared();
    if !std::sync::Arc::ptr_eq(shared, source.shared())
        || !std::sync::Arc::ptr_eq(shared, filter.shared())
    {
        return;
    }
    let mut st = shared.state.lock();
    if let Some(node) = st.nodes.get_mut(&view.id()) {
        node.view = Some(FilterView {
            source: source.id(),
            filter: filter.id(),
        });
    }
}

pub(crate) fn filtered_children(state: &GraphState, view: &FilterView) -> Vec<PropId> {
    let Some(source) = state.nodes.get(&view.source) else {
        return Vec::new();
    };
    let query = state
        .nodes
        .get(&view.filter)
        .and_then(|n| n.value.as_str())
        .map(str::trim)
        .unwrap_or("");

    if query.is_empty() {
        return source.children.clone();
    }

    let matcher = SkimMatcherV2::default();
    source
        .children
        .iter()
        .copied()
        .filter(|child| {
            label(state, *child).is_some_and(|l| matcher.fuzzy_match(&l, query).is_some())
        })
        .collect()
}

fn label(state: &GraphState, item: PropId) -> Option<String> {
    let title = state
        .child_named(item, "metadata")
        .and_then(|m| state.child_named(m, "title"));
    title
        .or_else(|| state.child_named(item, "url"))
        .and_then(|id| state.nodes.get(&id))
        .and_then(|n| n.value.as_str())
        .map(str::to_string)
}
