//! Loaded extensions and everything they registered.
//!
//! Routes, searchers and the extension list share one lock so unloading an
//! extension is atomic with respect to resolution.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{BridgeError, BridgeResult};
use crate::routing::{PriorityHint, RouteId, RouteMatch, RouteTable};
use crate::sandbox::ScriptFunction;
use crate::search::{Searcher, SearcherId, SearchRegistry};

use super::ExtensionId;

/// A loaded extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub id: ExtensionId,
    pub title: String,
    /// Disabled extensions keep their registrations but never match.
    pub enabled: bool,
}

/// What unloading an extension removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Unloaded {
    pub routes: usize,
    pub searchers: usize,
}

struct RegistryState {
    extensions: HashMap<ExtensionId, ExtensionInfo>,
    routes: RouteTable<ScriptFunction>,
    searchers: SearchRegistry<ScriptFunction>,
}

impl RegistryState {
    fn enabled(&self, id: &str) -> bool {
        self.extensions.get(id).is_some_and(|e| e.enabled)
    }

    fn require(&self, id: &str) -> BridgeResult<()> {
        if self.extensions.contains_key(id) {
            Ok(())
        } else {
            Err(BridgeError::ExtensionNotFound(id.to_string()))
        }
    }
}

pub struct ExtensionRegistry {
    state: RwLock<RegistryState>,
}

impl ExtensionRegistry {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                extensions: HashMap::new(),
                routes: RouteTable::new(case_insensitive),
                searchers: SearchRegistry::new(),
            }),
        }
    }

    /// Register an extension. Loading an id twice keeps the first entry and
    /// returns false.
    pub fn load(&self, id: &str, title: &str) -> bool {
        let mut state = self.state.write();
        if state.extensions.contains_key(id) {
            return false;
        }
        state.extensions.insert(
            id.to_string(),
            ExtensionInfo {
                id: id.to_string(),
                title: title.to_string(),
                enabled: true,
            },
        );
        tracing::info!(extension = id, "extension loaded");
        true
    }

    /// Remove an extension with all its routes and searchers.
    pub fn unload(&self, id: &str) -> Option<Unloaded> {
        let (routes, searchers) = {
            let mut state = self.state.write();
            state.extensions.remove(id)?;
            (
                state.routes.remove_owned_by(id),
                state.searchers.remove_owned_by(id),
            )
        };
        let unloaded = Unloaded {
            routes: routes.len(),
            searchers: searchers.len(),
        };
        tracing::info!(
            extension = id,
            routes = unloaded.routes,
            searchers = unloaded.searchers,
            "extension unloaded"
        );
        Some(unloaded)
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> BridgeResult<()> {
        let mut state = self.state.write();
        let ext = state
            .extensions
            .get_mut(id)
            .ok_or_else(|| BridgeError::ExtensionNotFound(id.to_string()))?;
        ext.enabled = enabled;
        tracing::debug!(extension = id, enabled, "extension toggled");
        Ok(())
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.state.read().enabled(id)
    }

    pub fn extensions(&self) -> Vec<ExtensionInfo> {
        let mut list: Vec<_> = self.state.read().extensions.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub fn add_route(
        &self,
        owner: &str,
        pattern: &str,
        hint: PriorityHint,
        handler: ScriptFunction,
    ) -> BridgeResult<RouteId> {
        let mut state = self.state.write();
        state.require(owner)?;
        state.routes.add(pattern, hint, handler, owner)
    }

    pub fn remove_route(&self, id: RouteId) -> Option<ScriptFunction> {
        let handler = self.state.write().routes.remove(id);
        if handler.is_some() {
            tracing::debug!(route = ?id, "route removed");
        }
        handler
    }

    pub fn add_searcher(
        &self,
        owner: &str,
        title: &str,
        icon: Option<&str>,
        handler: ScriptFunction,
    ) -> BridgeResult<SearcherId> {
        let mut state = self.state.write();
        state.require(owner)?;
        Ok(state.searchers.add(title, icon, handler, owner))
    }

    pub fn remove_searcher(&self, id: SearcherId) -> Option<ScriptFunction> {
        self.state.write().searchers.remove(id)
    }

    /// Highest-priority route of an enabled extension matching `url`.
    pub fn resolve(&self, url: &str) -> Option<RouteMatch<ScriptFunction>> {
        let state = self.state.read();
        state.routes.resolve_with(url, |owner| state.enabled(owner))
    }

    /// Searchers of enabled extensions.
    pub fn searchers(&self) -> Vec<Searcher<ScriptFunction>> {
        let state = self.state.read();
        state.searchers.snapshot_with(|owner| state.enabled(owner))
    }

    pub fn route_count(&self, owner: &str) -> usize {
        self.state.read().routes.count_owned_by(owner)
    }

    pub fn searcher_count(&self, owner: &str) -> usize {
        self.state.read().searchers.count_owned_by(owner)
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{NativeRuntime, ScriptValue};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn handler(runtime: &NativeRuntime, name: &str) -> ScriptFunction {
        runtime.function(name, 0, |_, _, _| Ok(ScriptValue::Undefined))
    }

    #[test]
    fn test_registration_requires_loaded_extension() {
        let runtime = NativeRuntime::new();
        let registry = ExtensionRegistry::default();

        let err = registry
            .add_route("ghost", "^a$", PriorityHint::Derived, handler(&runtime, "a"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::ExtensionNotFound(id) if id == "ghost"));
        assert!(registry
            .add_searcher("ghost", "Ghost", None, handler(&runtime, "s"))
            .is_err());

        assert!(registry.load("ext.a", "A"));
        assert!(!registry.load("ext.a", "Again"));
        assert_eq!(registry.extensions()[0].title, "A");
        registry
            .add_route("ext.a", "^a$", PriorityHint::Derived, handler(&runtime, "a"))
            .unwrap();
        assert_eq!(registry.route_count("ext.a"), 1);
    }

    #[test]
    fn test_disabled_extension_is_skipped() {
        let runtime = NativeRuntime::new();
        let registry = ExtensionRegistry::default();
        registry.load("ext.a", "A");
        registry.load("ext.b", "B");
        registry
            .add_route(
                "ext.a",
                "^browse/movies$",
                PriorityHint::Derived,
                handler(&runtime, "movies"),
            )
            .unwrap();
        registry
            .add_route("ext.b", "^browse/(.*)$", PriorityHint::Derived, handler(&runtime, "any"))
            .unwrap();
        registry
            .add_searcher("ext.a", "Movies", None, handler(&runtime, "search"))
            .unwrap();

        assert_eq!(registry.resolve("browse/movies").unwrap().owner, "ext.a");

        registry.set_enabled("ext.a", false).unwrap();
        assert!(!registry.is_enabled("ext.a"));
        let m = registry.resolve("browse/movies").unwrap();
        assert_eq!(m.owner, "ext.b");
        assert_eq!(m.captures, vec!["movies".to_string()]);
        assert!(registry.searchers().is_empty());
        assert_eq!(registry.route_count("ext.a"), 1);

        registry.set_enabled("ext.a", true).unwrap();
        assert_eq!(registry.searchers().len(), 1);
        assert!(registry.set_enabled("ghost", true).is_err());
    }

    #[test]
    fn test_unload_removes_only_owned_entries() {
        let runtime = NativeRuntime::new();
        let registry = ExtensionRegistry::default();
        registry.load("ext.a", "A");
        registry.load("ext.b", "B");
        for i in 0..3 {
            registry
                .add_route(
                    "ext.a",
                    &format!("^a/{i}$"),
                    PriorityHint::Derived,
                    handler(&runtime, "a"),
                )
                .unwrap();
        }
        registry
            .add_route("ext.b", "^b$", PriorityHint::Derived, handler(&runtime, "b"))
            .unwrap();
        registry.add_searcher("ext.a", "A", None, handler(&runtime, "sa")).unwrap();
        registry.add_searcher("ext.b", "B", None, handler(&runtime, "sb")).unwrap();

        let gone = registry.unload("ext.a").unwrap();
        assert_eq!(gone, Unloaded { routes: 3, searchers: 1 });
        assert_eq!(registry.route_count("ext.a"), 0);
        assert_eq!(registry.searcher_count("ext.a"), 0);
        assert_eq!(registry.route_count("ext.b"), 1);
        assert_eq!(registry.searcher_count("ext.b"), 1);
        assert!(registry.unload("ext.a").is_none());

        // a:* handlers and the "sa" searcher were unrooted
        assert_eq!(runtime.rooted(), 2);
    }

    #[test]
    fn test_remove_route_by_id() {
        let runtime = NativeRuntime::new();
        let registry = ExtensionRegistry::default();
        registry.load("ext.a", "A");
        let id = registry
            .add_route("ext.a", "^a$", PriorityHint::Derived, handler(&runtime, "a"))
            .unwrap();
        assert!(registry.remove_route(id).is_some());
        assert!(registry.remove_route(id).is_none());
        assert!(registry.resolve("a").is_none());
    }

    #[test]
    fn test_unload_is_atomic_for_concurrent_resolve() {
        let runtime = NativeRuntime::new();
        let registry = Arc::new(ExtensionRegistry::default());
        registry.load("ext.a", "A");
        registry.load("ext.b", "B");

        // ext.a owns the more specific routes; ext.b is the fallback
        for i in 0..50 {
            registry
                .add_route(
                    "ext.a",
                    &format!("^item/{i}$"),
                    PriorityHint::Derived,
                    handler(&runtime, "a"),
                )
                .unwrap();
        }
        for i in 0..20 {
            registry
                .add_searcher("ext.a", &format!("A{i}"), None, handler(&runtime, "sa"))
                .unwrap();
        }
        registry
            .add_searcher("ext.b", "B", None, handler(&runtime, "sb"))
            .unwrap();
        registry
            .add_route("ext.b", "^item/(.*)$", PriorityHint::Derived, handler(&runtime, "b"))
            .unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let mut readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut removed = false;
                    while !done.load(Ordering::Acquire) {
                        for i in 0..50 {
                            let m = registry.resolve(&format!("item/{i}")).unwrap();
                            if m.owner == "ext.b" {
                                removed = true;
                            } else {
                                assert!(!removed, "saw a partially unloaded extension");
                            }
                        }
                    }
                })
            })
            .collect();
        readers.extend((0..2).map(|_| {
            let registry = Arc::clone(&registry);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut removed = false;
                while !done.load(Ordering::Acquire) {
                    let searchers = registry.searchers();
                    let from_a = searchers.iter().filter(|s| s.owner == "ext.a").count();
                    assert!(from_a == 0 || from_a == 20, "saw {from_a} of 20 searchers");
                    assert!(searchers.iter().any(|s| s.owner == "ext.b"));
                    if from_a == 0 {
                        removed = true;
                    } else {
                        assert!(!removed, "unloaded searchers came back");
                    }
                }
            })
        }));

        thread::sleep(std::time::Duration::from_millis(20));
        registry.unload("ext.a");
        done.store(true, Ordering::Release);
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(registry.route_count("ext.a"), 0);
        assert_eq!(registry.searcher_count("ext.a"), 0);
        assert_eq!(registry.searchers().len(), 1);
        assert_eq!(registry.resolve("item/7").unwrap().owner, "ext.b");
    }
}
