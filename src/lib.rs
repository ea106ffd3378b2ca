//! Pagebridge - reactive page models for extension scripts.
//!
//! Extension scripts register routes and searchers. When a URL is opened or a
//! query is run, the matching script gets a model object bound to a subtree
//! of an observable property graph. The script fills it in (items, metadata,
//! loading state), registers event handlers and a paginator, and a renderer
//! watches the same subtree change.
//!
//! # Architecture
//!
//! The library is organized into these main modules:
//!
//! - [`graph`] - Observable property graph and per-session notification queues
//! - [`sandbox`] - Script function, value and context abstractions
//! - [`routing`] - Priority-ordered URL pattern table
//! - [`search`] - Searcher registry and search-class nodes
//! - [`resolver`] - Content resolution and `prop:` URLs for sub-models
//! - [`page`] - Models, items, event dispatch and the session runner
//! - [`extensions`] - Extension registry and the bridge host
//! - [`config`] - Configuration loading
//!
//! # Threading
//!
//! Each opened page or search result runs on its own session thread. The
//! open handler and every event or paginator callback for that model run
//! there; the graph, route table and search registry are shared and locked.
//!
//! # Example
//!
//! ```ignore
//! use pagebridge::{BridgeConfig, BridgeHost, NativeRuntime, PropGraph};
//!
//! let config = BridgeConfig::load();
//! pagebridge::logging::init_from(&config.logging);
//!
//! let graph = PropGraph::new();
//! let host = pagebridge::extensions::init(BridgeHost::new(
//!     config,
//!     graph.clone(),
//!     std::sync::Arc::new(NativeRuntime::new()),
//! ));
//!
//! let page = graph.root().create_child("page");
//! let session = host.open(&page, "browse/movies")?;
//! ```

// Public modules
pub mod config;
pub mod extensions;
pub mod graph;
pub mod logging;
pub mod page;
pub mod resolver;
pub mod routing;
pub mod sandbox;
pub mod search;

// Internal modules
mod error;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types for convenience
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use extensions::{BridgeHost, ExtensionHandle};
pub use graph::{Courier, Prop, PropGraph, PropValue};
pub use page::{ItemObject, ModelObject, SessionHandle, SessionState};
pub use sandbox::{NativeRuntime, ScriptFunction, ScriptValue};
