//! Script sandbox contracts.
//!
//! The bridge never evaluates script code itself. Script callbacks are held as
//! [`ScriptFunction`] handles and invoked inside a [`ScriptContext`] owned by
//! the calling session thread. A sandbox adapter supplies the
//! [`ScriptRuntime`] that creates contexts and the [`Invocable`]
//! implementations behind each function.
//!
//! # Rooting
//!
//! A function held outside the sandbox's own stack must stay pinned.
//! [`ScriptFunction::new`] roots the invocable, and the last clone to drop
//! unroots it, so callers never pair root/unroot calls by hand.

pub mod native;
mod value;

pub use native::{NativeContext, NativeRuntime};
pub use value::ScriptValue;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A failure raised by script code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A per-thread script execution context.
pub trait ScriptContext {
    /// Surface an error to the script environment's own error channel.
    fn report_error(&mut self, error: &ScriptError);
}

/// Creates execution contexts for session threads.
pub trait ScriptRuntime: Send + Sync {
    fn new_context(&self) -> Box<dyn ScriptContext>;
}

/// A callable script capability.
pub trait Invocable: Send + Sync {
    /// Number of declared parameters.
    fn arity(&self) -> usize;

    fn call(
        &self,
        cx: &mut dyn ScriptContext,
        this: &ScriptValue,
        args: &[ScriptValue],
    ) -> Result<ScriptValue, ScriptError>;

    /// Pin the function while it is referenced from outside the sandbox.
    fn root(&self) {}

    fn unroot(&self) {}

    fn name(&self) -> &str {
        "<anonymous>"
    }
}

struct Rooted {
    func: Box<dyn Invocable>,
}

impl Drop for Rooted {
    fn drop(&mut self) {
        self.func.unroot();
    }
}

/// A rooted, shareable reference to a script function.
#[derive(Clone)]
pub struct ScriptFunction {
    inner: Arc<Rooted>,
}

impl ScriptFunction {
    pub fn new(func: impl Invocable + 'static) -> Self {
        func.root();
        Self {
            inner: Arc::new(Rooted {
                func: Box::new(func),
            }),
        }
    }

    pub fn arity(&self) -> usize {
        self.inner.func.arity()
    }

    pub fn name(&self) -> &str {
        self.inner.func.name()
    }

    /// Call the function with `args` padded or truncated to its arity.
    pub fn invoke(
        &self,
        cx: &mut dyn ScriptContext,
        this: &ScriptValue,
        args: Vec<ScriptValue>,
    ) -> Result<ScriptValue, ScriptError> {
        let args = fit_arity(args, self.arity());
        self.inner.func.call(cx, this, &args)
    }

    /// Whether both handles refer to the same rooted function.
    pub fn ptr_eq(&self, other: &ScriptFunction) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptFunction")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .finish()
    }
}

/// Pad with `undefined` or truncate so exactly `arity` arguments remain.
pub fn fit_arity(mut args: Vec<ScriptValue>, arity: usize) -> Vec<ScriptValue> {
    args.resize(arity, ScriptValue::Undefined);
    args
}

/// Invoke `func`, routing a failure to the context's error channel.
///
/// Returns `None` when the call failed. Failures never propagate further:
/// the caller keeps servicing its session.
pub fn call_reporting(
    cx: &mut dyn ScriptContext,
    func: &ScriptFunction,
    this: &ScriptValue,
    args: Vec<ScriptValue>,
) -> Option<ScriptValue> {
    match func.invoke(cx, this, args) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(function = func.name(), error = %err, "script handler failed");
            cx.report_error(&err);
            None
        }
    }
}
