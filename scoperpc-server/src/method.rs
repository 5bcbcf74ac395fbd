//! Method trait and adapters for registering callables
//!
//! A method receives its positional arguments plus a trailing completion
//! handle, and reports its outcome by calling that handle exactly once,
//! either before returning or later from another task. Returning `Err`
//! signals a synchronous fault: the dispatcher answers the request with an
//! internal error and hands the fault back to its own caller.
//!
//! # Creating Methods
//!
//! 1. **from_fn**: raw callback form, full control over the completion handle
//! 2. **from_sync_fn**: plain function that completes before returning
//! 3. **from_async_fn**: async closure run on the ambient tokio runtime
//! 4. **from_typed_fn**: async closure with serde conversion of args/result
//!
//! # Examples
//!
//! ```rust
//! use scoperpc_server::{from_fn, from_typed_fn};
//! use scoperpc_core::MethodError;
//! use serde_json::Value;
//!
//! // Echo the first argument back, completing synchronously
//! let echo = from_fn(|_cx, args, done| {
//!     done.ok(args.into_iter().next().unwrap_or(Value::Null));
//!     Ok(())
//! });
//!
//! // Typed: params [a, b] deserialize into a tuple
//! let add = from_typed_fn(|(a, b): (i64, i64)| async move {
//!     Ok::<_, MethodError>(a + b)
//! });
//! ```

use crate::completion::Completion;
use crate::registry::MethodRegistry;
use scoperpc_core::{Fault, MethodError};
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;

/// Opaque per-request object handed through to methods unchanged
///
/// Transport adapters put whatever they want here (an HTTP request, a peer
/// address, nothing at all); the dispatcher never looks inside.
pub type Transport = Arc<dyn Any + Send + Sync>;

/// Transport for callers that have nothing to pass through
pub fn no_transport() -> Transport {
    Arc::new(())
}

/// Context a method is invoked with
///
/// Exposes the full registry, so methods can look up their siblings, and
/// the transport object of the request being served.
#[derive(Clone)]
pub struct Invocation {
    registry: MethodRegistry,
    transport: Transport,
    method: String,
}

impl Invocation {
    pub(crate) fn new(registry: MethodRegistry, transport: Transport, method: String) -> Self {
        Self {
            registry,
            transport,
            method,
        }
    }

    /// The registry the method was resolved from
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// The raw transport object
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The transport object, if it is a `T`
    pub fn transport_as<T: Any>(&self) -> Option<&T> {
        self.transport.downcast_ref::<T>()
    }

    /// Name the method was invoked under
    pub fn method(&self) -> &str {
        &self.method
    }
}

/// A callable registered under a method name
pub trait Method: Send + Sync {
    /// Invoke the method
    ///
    /// `args` are the request's params: the elements of an array, a single
    /// non-array value wrapped in a one-element list, or nothing. `done`
    /// must be called exactly once; if it never is, the request stays
    /// pending forever.
    fn call(&self, invocation: Invocation, args: Vec<Value>, done: Completion)
        -> Result<(), Fault>;
}

/// Adapts a closure into a `Method`
pub struct FnMethod<F>
where
    F: Fn(Invocation, Vec<Value>, Completion) -> Result<(), Fault> + Send + Sync,
{
    func: F,
}

impl<F> FnMethod<F>
where
    F: Fn(Invocation, Vec<Value>, Completion) -> Result<(), Fault> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Method for FnMethod<F>
where
    F: Fn(Invocation, Vec<Value>, Completion) -> Result<(), Fault> + Send + Sync,
{
    fn call(
        &self,
        invocation: Invocation,
        args: Vec<Value>,
        done: Completion,
    ) -> Result<(), Fault> {
        (self.func)(invocation, args, done)
    }
}

/// Create a method from a raw callback closure
pub fn from_fn<F>(func: F) -> Box<dyn Method>
where
    F: Fn(Invocation, Vec<Value>, Completion) -> Result<(), Fault> + Send + Sync + 'static,
{
    Box::new(FnMethod::new(func))
}

/// Create a method from a plain function that completes before returning
pub fn from_sync_fn<F>(func: F) -> Box<dyn Method>
where
    F: Fn(Vec<Value>) -> Result<Value, MethodError> + Send + Sync + 'static,
{
    from_fn(move |_cx, args, done| {
        done.finish(func(args));
        Ok(())
    })
}

/// Create a method from an async closure
///
/// The future is spawned on the current tokio runtime and the request
/// completes when it resolves. Invoking the method outside a runtime is a
/// fault.
pub fn from_async_fn<F, Fut>(func: F) -> Box<dyn Method>
where
    F: Fn(Invocation, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, MethodError>> + Send + 'static,
{
    from_fn(move |cx, args, done| {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Fault::new(format!("No async runtime: {}", e)))?;
        let fut = func(cx, args);
        runtime.spawn(async move {
            done.finish(fut.await);
        });
        Ok(())
    })
}

/// Create a method from an async closure with serde conversion
///
/// The argument list is deserialized as a JSON array into `P`, so tuples
/// map naturally onto positional params. A mismatch completes the request
/// with a native error, reported as an internal error.
pub fn from_typed_fn<P, R, F, Fut>(func: F) -> Box<dyn Method>
where
    P: serde::de::DeserializeOwned + Send + 'static,
    R: serde::Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, MethodError>> + Send + 'static,
{
    let func = Arc::new(func);

    from_async_fn(move |_cx, args| {
        let func = Arc::clone(&func);
        async move {
            let params: P = serde_json::from_value(Value::Array(args))?;
            let result = func(params).await?;
            serde_json::to_value(result).map_err(MethodError::from)
        }
    })
}
