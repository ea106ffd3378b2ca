//! Sandbox adapter backed by Rust closures.
//!
//! Useful for hosts that register handlers from Rust, and as the reference
//! adapter for the bridge's own tests. It counts rooted functions and live
//! contexts and records every error reported through a context.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Invocable, ScriptContext, ScriptError, ScriptFunction, ScriptRuntime, ScriptValue};

type NativeResult = Result<ScriptValue, ScriptError>;

type NativeBody = dyn Fn(&mut dyn ScriptContext, &ScriptValue, &[ScriptValue]) -> NativeResult
    + Send
    + Sync;

#[derive(Default)]
struct NativeShared {
    roots: AtomicUsize,
    live_contexts: AtomicUsize,
    errors: Mutex<Vec<String>>,
}

struct NativeFunction {
    name: String,
    arity: usize,
    body: Box<NativeBody>,
    shared: Arc<NativeShared>,
}

impl Invocable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(
        &self,
        cx: &mut dyn ScriptContext,
        this: &ScriptValue,
        args: &[ScriptValue],
    ) -> Result<ScriptValue, ScriptError> {
        (self.body)(cx, this, args)
    }

    fn root(&self) {
        self.shared.roots.fetch_add(1, Ordering::SeqCst);
    }

    fn unroot(&self) {
        self.shared.roots.fetch_sub(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A runtime whose functions are Rust closures.
#[derive(Clone, Default)]
pub struct NativeRuntime {
    shared: Arc<NativeShared>,
}

impl NativeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a closure as a rooted script function.
    pub fn function<F>(&self, name: &str, arity: usize, body: F) -> ScriptFunction
    where
        F: Fn(&mut dyn ScriptContext, &ScriptValue, &[ScriptValue]) -> NativeResult
            + Send
            + Sync
            + 'static,
    {
        ScriptFunction::new(NativeFunction {
            name: name.to_string(),
            arity,
            body: Box::new(body),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Number of functions currently rooted.
    pub fn rooted(&self) -> usize {
        self.shared.roots.load(Ordering::SeqCst)
    }

    /// Number of contexts not yet torn down.
    pub fn live_contexts(&self) -> usize {
        self.shared.live_contexts.load(Ordering::SeqCst)
    }

    /// Messages reported through any context of this runtime.
    pub fn errors(&self) -> Vec<String> {
        self.shared.errors.lock().clone()
    }
}

impl ScriptRuntime for NativeRuntime {
    fn new_context(&self) -> Box<dyn ScriptContext> {
        self.shared.live_contexts.fetch_add(1, Ordering::SeqCst);
        Box::new(NativeContext {
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Execution context handed out by [`NativeRuntime`].
pub struct NativeContext {
    shared: Arc<NativeShared>,
}

impl ScriptContext for NativeContext {
    fn report_error(&mut self, error: &ScriptError) {
        self.shared.errors.lock().push(error.message.clone());
    }
}

impl Drop for NativeContext {
    fn drop(&mut self) {
        self.shared.live_contexts.fetch_sub(1, Ordering::SeqCst);
    }
}
