//! Extension-facing side of the bridge.
//!
//! # Architecture
//!
//! ```text
//! BridgeHost
//! ├── registry: ExtensionRegistry
//! │   ├── extensions: HashMap<ExtensionId, ExtensionInfo>
//! │   ├── routes: RouteTable<ScriptFunction>
//! │   └── searchers: SearchRegistry<ScriptFunction>
//! ├── runtime: Arc<dyn ScriptRuntime>
//! └── services: PageServices (graph, resolver, prop backend)
//! ```
//!
//! Extensions register through an [`ExtensionHandle`]. `BridgeHost::open`
//! resolves a URL to a route and launches a page session;
//! `BridgeHost::search` launches one session per enabled searcher.

mod host;
mod registry;

pub use host::{global, init, shutdown, BridgeHost, ExtensionHandle};
pub use registry::{ExtensionInfo, ExtensionRegistry, Unloaded};

/// Unique identifier for an extension.
pub type ExtensionId = String;
