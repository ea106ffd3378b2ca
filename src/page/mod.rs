//! Script-facing page models.
//!
//! A page model binds a script object to a subtree of the property graph.
//! [`create_model`] builds one for an open handler, [`launch`] starts the
//! session thread that runs the handler and services the model's event,
//! item and pagination subscriptions.

mod events;
mod item;
mod model;
mod session;

use std::sync::Arc;

use crate::graph::PropGraph;
use crate::resolver::{ContentResolver, NoResolver, PropBackend};

pub use item::ItemObject;
pub use model::{create_model, ModelObject};
pub use session::{launch, SessionHandle, SessionState};

/// Host services a model needs while it runs.
#[derive(Clone)]
pub struct PageServices {
    /// Offered untyped item URLs before they are appended.
    pub resolver: Arc<dyn ContentResolver>,
    /// Mints `prop:` URLs for sub-models.
    pub backend: PropBackend,
}

impl PageServices {
    pub fn new(graph: PropGraph) -> Self {
        Self {
            resolver: Arc::new(NoResolver),
            backend: PropBackend::new(graph),
        }
    }

    pub fn with_resolver(mut self, resolver: impl ContentResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }
}
