//! Completion handles and response shaping
//!
//! Every dispatch owns exactly one continuation. It is wrapped in a
//! [`Delivery`], shared between the method's [`Completion`] handle and the
//! dispatcher's own fault path, so whichever reports first wins and the
//! continuation never runs twice.

use crate::metrics::DispatchMetrics;
use scoperpc_core::{is_truthy, ErrorObject, MethodError, Reply, Response, ResponseError};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Receiver of the final reply of a dispatch
pub type Continuation = Box<dyn FnOnce(Reply) + Send + 'static>;

/// At-most-once wrapper around a continuation
#[derive(Clone)]
pub(crate) struct Delivery {
    state: Arc<Mutex<DeliveryState>>,
}

struct DeliveryState {
    continuation: Option<Continuation>,
    invoking: bool,
    dropped_while_invoking: bool,
}

impl Delivery {
    pub(crate) fn new(continuation: Continuation) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeliveryState {
                continuation: Some(continuation),
                invoking: false,
                dropped_while_invoking: false,
            })),
        }
    }

    /// Hand the reply to the continuation, unless it already ran
    ///
    /// The continuation is called outside the lock, so it may re-enter the
    /// dispatcher.
    pub(crate) fn deliver(&self, reply: Reply) -> bool {
        let continuation = self.lock().continuation.take();

        match continuation {
            Some(continuation) => {
                continuation(reply);
                true
            }
            None => {
                tracing::warn!("Reply dropped: continuation already called");
                false
            }
        }
    }

    /// Mark the start of the synchronous method call
    pub(crate) fn begin_invocation(&self) {
        self.lock().invoking = true;
    }

    /// Mark the end of the synchronous method call
    ///
    /// Returns whether the completion handle was dropped during the call
    /// without answering.
    pub(crate) fn end_invocation(&self) -> bool {
        let mut state = self.lock();
        state.invoking = false;
        state.dropped_while_invoking && state.continuation.is_some()
    }

    /// Record that the completion handle went away unanswered
    ///
    /// Returns whether the request is now pending for good. Drops during
    /// the synchronous call are settled by the dispatcher instead, which
    /// may still answer with a fault.
    fn abandon(&self) -> bool {
        let mut state = self.lock();
        if state.invoking {
            state.dropped_while_invoking = true;
            false
        } else {
            state.continuation.is_some()
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeliveryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Normalize a method outcome into a response
///
/// - no error, or a falsy structured error: success carrying `result`
/// - native error: internal error carrying its message
/// - structured error: passed through verbatim
pub fn shape_response(error: Option<MethodError>, result: Value, id: Option<Value>) -> Response {
    match error {
        None => Response::success(result, id),
        Some(MethodError::Structured(value)) if !is_truthy(&value) => Response::success(result, id),
        Some(MethodError::Native(message)) => {
            Response::failure(ErrorObject::internal_error(message), id)
        }
        Some(MethodError::Structured(value)) => {
            Response::failure(ResponseError::Passthrough(value), id)
        }
    }
}

/// Handle a method uses to report its outcome
///
/// Consuming `self` makes a second report impossible. Dropping the handle
/// without calling it leaves the request pending, unless the method then
/// faults and the dispatcher answers instead.
pub struct Completion {
    delivery: Option<Delivery>,
    id: Option<Value>,
    method: String,
    started: Instant,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl Completion {
    pub(crate) fn new(
        delivery: Delivery,
        id: Option<Value>,
        method: String,
        metrics: Option<Arc<DispatchMetrics>>,
    ) -> Self {
        Self {
            delivery: Some(delivery),
            id,
            method,
            started: Instant::now(),
            metrics,
        }
    }

    /// Report `(error, result)` the way the protocol's callbacks do
    pub fn complete(mut self, error: Option<MethodError>, result: Value) {
        let Some(delivery) = self.delivery.take() else {
            return;
        };

        let response = shape_response(error, result, self.id.take());
        let status = if response.is_error() { "error" } else { "success" };

        tracing::debug!(method = %self.method, status, "Method completed");
        if let Some(metrics) = &self.metrics {
            metrics.record_request(&self.method, status, self.started.elapsed().as_secs_f64());
        }

        if !delivery.deliver(Reply::Single(response)) {
            tracing::warn!(method = %self.method, "Method completed after its request was answered");
        }
    }

    /// Report success
    pub fn ok(self, result: Value) {
        self.complete(None, result);
    }

    /// Report an error
    pub fn fail(self, error: MethodError) {
        self.complete(Some(error), Value::Null);
    }

    /// Report a `Result`
    pub fn finish(self, outcome: Result<Value, MethodError>) {
        match outcome {
            Ok(result) => self.ok(result),
            Err(error) => self.fail(error),
        }
    }

    /// Name of the method this handle belongs to
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(delivery) = self.delivery.take() {
            if delivery.abandon() {
                warn_pending(&self.method);
            }
        }
    }
}

pub(crate) fn warn_pending(method: &str) {
    tracing::warn!(method = %method, "Completion dropped without a response; request stays pending");
}
