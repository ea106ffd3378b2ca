//! Bridge host - routes page requests and search queries to extensions.
//!
//! The host owns the extension registry and everything a launched model
//! needs: the property graph, the script runtime and the session settings.
//! A process-wide instance is managed with [`init`], [`global`] and
//! [`shutdown`].

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::graph::{Prop, PropGraph};
use crate::page::{create_model, launch, PageServices, SessionHandle};
use crate::resolver::ContentResolver;
use crate::routing::{PriorityHint, RouteId};
use crate::sandbox::{ScriptFunction, ScriptRuntime, ScriptValue};
use crate::search::{create_search_class, SearcherId};

use super::registry::{ExtensionInfo, ExtensionRegistry, Unloaded};
use super::ExtensionId;

static HOST: Lazy<RwLock<Option<Arc<BridgeHost>>>> = Lazy::new(|| RwLock::new(None));

/// Install `host` as the process-wide host. A previously installed host is
/// shut down.
pub fn init(host: BridgeHost) -> Arc<BridgeHost> {
    let host = Arc::new(host);
    let previous = HOST.write().replace(Arc::clone(&host));
    if let Some(previous) = previous {
        tracing::warn!("replacing an initialized bridge host");
        previous.unload_all();
    }
    host
}

/// The process-wide host, if one is installed.
pub fn global() -> Option<Arc<BridgeHost>> {
    HOST.read().clone()
}

/// Uninstall the process-wide host and unload all of its extensions.
/// Returns false if no host was installed.
pub fn shutdown() -> bool {
    let Some(host) = HOST.write().take() else {
        return false;
    };
    host.unload_all();
    tracing::info!("bridge host shut down");
    true
}

fn require_function(value: &ScriptValue) -> BridgeResult<ScriptFunction> {
    value
        .as_function()
        .cloned()
        .ok_or_else(|| BridgeError::Argument("Argument is not a function".to_string()))
}

/// Script-visible object for one loaded extension.
#[derive(Clone)]
pub struct ExtensionHandle {
    id: ExtensionId,
    registry: Arc<ExtensionRegistry>,
}

impl ExtensionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Register a route with a priority derived from the pattern.
    pub fn add_route(&self, pattern: &str, handler: &ScriptValue) -> BridgeResult<RouteId> {
        self.add_route_with(pattern, PriorityHint::Derived, handler)
    }

    pub fn add_route_with(
        &self,
        pattern: &str,
        hint: PriorityHint,
        handler: &ScriptValue,
    ) -> BridgeResult<RouteId> {
        let func = require_function(handler)?;
        self.registry.add_route(&self.id, pattern, hint, func)
    }

    pub fn remove_route(&self, id: RouteId) -> bool {
        self.registry.remove_route(id).is_some()
    }

    pub fn add_searcher(
        &self,
        title: &str,
        icon: Option<&str>,
        handler: &ScriptValue,
    ) -> BridgeResult<SearcherId> {
        let func = require_function(handler)?;
        self.registry.add_searcher(&self.id, title, icon, func)
    }

    pub fn remove_searcher(&self, id: SearcherId) -> bool {
        self.registry.remove_searcher(id).is_some()
    }
}

/// Routes page requests and search queries to extension scripts.
pub struct BridgeHost {
    config: BridgeConfig,
    runtime: Arc<dyn ScriptRuntime>,
    services: PageServices,
    registry: Arc<ExtensionRegistry>,
}

impl BridgeHost {
    pub fn new(config: BridgeConfig, graph: PropGraph, runtime: Arc<dyn ScriptRuntime>) -> Self {
        let registry = Arc::new(ExtensionRegistry::new(config.routes.case_insensitive));
        Self {
            config,
            runtime,
            services: PageServices::new(graph),
            registry,
        }
    }

    /// Use `resolver` for untyped items appended by models.
    pub fn with_resolver(mut self, resolver: impl ContentResolver + 'static) -> Self {
        self.services = self.services.with_resolver(resolver);
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn graph(&self) -> &PropGraph {
        self.services.backend.graph()
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Load an extension and return the object it registers through. Loading
    /// an already loaded id returns a handle to the existing extension.
    pub fn load_extension(&self, id: &str, title: &str) -> ExtensionHandle {
        if !self.registry.load(id, title) {
            tracing::debug!(extension = id, "extension already loaded");
        }
        ExtensionHandle {
            id: id.to_string(),
            registry: Arc::clone(&self.registry),
        }
    }

    pub fn unload_extension(&self, id: &str) -> BridgeResult<Unloaded> {
        self.registry
            .unload(id)
            .ok_or_else(|| BridgeError::ExtensionNotFound(id.to_string()))
    }

    pub fn set_extension_enabled(&self, id: &str, enabled: bool) -> BridgeResult<()> {
        self.registry.set_enabled(id, enabled)
    }

    pub fn extensions(&self) -> Vec<ExtensionInfo> {
        self.registry.extensions()
    }

    fn unload_all(&self) {
        for ext in self.registry.extensions() {
            self.registry.unload(&ext.id);
        }
    }

    /// Open `url` into `page`.
    ///
    /// `NoRoute` means no enabled extension handles the URL and the caller
    /// should try its next resolver.
    pub fn open(&self, page: &Prop, url: &str) -> BridgeResult<SessionHandle> {
        let route = self.registry.resolve(url).ok_or_else(|| BridgeError::NoRoute {
            url: url.to_string(),
        })?;
        tracing::debug!(url, pattern = %route.pattern, owner = %route.owner, "route matched");

        let args = route.captures.into_iter().map(ScriptValue::from).collect();
        let model = create_model(route.handler, args, self.services.clone());
        model.wire_page_properties(page);
        launch(model, Arc::clone(&self.runtime), &self.config.session)
    }

    /// Fan `query` out to every enabled searcher.
    ///
    /// Each searcher gets a search class under the configured container of
    /// `node` and its own session. A searcher whose session cannot start is
    /// skipped and its class removed.
    pub fn search(&self, node: &Prop, query: &str) -> Vec<SessionHandle> {
        let container = node.create_path(&self.config.search.container);
        let mut sessions = Vec::new();

        for searcher in self.registry.searchers() {
            let icon = searcher.icon.as_deref();
            let class = create_search_class(&container, &searcher.title, icon);
            let model = create_model(
                searcher.handler,
                vec![ScriptValue::from(query)],
                self.services.clone(),
            );
            model.wire_search_properties(&class);

            match launch(model, Arc::clone(&self.runtime), &self.config.session) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    class.root.destroy();
                    tracing::warn!(
                        searcher = %searcher.title,
                        error = %e,
                        "search session failed"
                    );
                }
            }
        }
        sessions
    }
}
