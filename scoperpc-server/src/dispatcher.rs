//! Dispatcher: routes decoded payloads to registered methods
//!
//! A payload is either a single request object or a batch (array). Each
//! request is validated and resolved against the shared registry, then its
//! method is invoked with the positional arguments and a completion handle.
//! The dispatcher hands exactly one reply to the continuation: a response
//! for a single request, or the responses of a batch in input order.
//!
//! # Faults
//!
//! A method that fails synchronously, by returning `Err(Fault)` or by
//! panicking, is answered with an internal error carrying the fault's
//! message and stack. The fault is then raised again to the caller: `Err`
//! for a returned fault, resumed unwinding for a panic. Remaining elements
//! of an enclosing batch are not dispatched, so that batch never replies.
//!
//! # Examples
//!
//! ```rust
//! use scoperpc_server::{from_sync_fn, no_transport, Dispatcher, MethodRegistry};
//! use serde_json::json;
//!
//! let registry = MethodRegistry::new();
//! registry
//!     .register("echo", from_sync_fn(|args| Ok(args.into_iter().next().unwrap_or_default())))
//!     .unwrap();
//!
//! let dispatcher = Dispatcher::new(registry);
//! dispatcher
//!     .handle(&json!({"method": "echo", "params": [42], "id": 1}), no_transport(), |reply| {
//!         assert_eq!(reply.to_value(), json!({"id": 1, "error": null, "result": 42}));
//!     })
//!     .unwrap();
//! ```

use crate::batch::BatchAggregator;
use crate::builder::DispatcherBuilder;
use crate::completion::{warn_pending, Completion, Continuation, Delivery};
use crate::method::{Invocation, Transport};
use crate::metrics::DispatchMetrics;
use crate::observer::ObserverList;
use crate::registry::MethodRegistry;
use crate::resolver::{resolve, Resolved};
use scoperpc_core::{Error, ErrorObject, Fault, Reply, Response, Result};
use serde_json::Value;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Routes payloads to the methods of a shared registry
///
/// Cloning is cheap; clones share the registry, observers and metrics.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    registry: MethodRegistry,
    observers: ObserverList,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`, installing `rpc.methodList`
    pub fn new(registry: MethodRegistry) -> Self {
        Self::from_parts(registry, ObserverList::new(), None)
    }

    /// Create a builder
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub(crate) fn from_parts(
        registry: MethodRegistry,
        observers: ObserverList,
        metrics: Option<Arc<DispatchMetrics>>,
    ) -> Self {
        registry.install_method_list();
        Self {
            registry,
            observers,
            metrics,
        }
    }

    /// The registry methods are resolved against
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Handle a top-level payload
    ///
    /// Observers see the raw payload first; then it is dispatched and
    /// `on_reply` receives the reply, now or later.
    pub fn handle<F>(&self, payload: &Value, transport: Transport, on_reply: F) -> Result<()>
    where
        F: FnOnce(Reply) + Send + 'static,
    {
        self.observers.notify(payload);
        if let Some(metrics) = &self.metrics {
            metrics.record_payload(payload.is_array());
        }
        self.dispatch(payload, transport, Box::new(on_reply))
    }

    /// Handle a top-level payload and wait for its reply
    ///
    /// A synchronous fault surfaces as `Err(Error::Fault)`. If a method drops
    /// its completion handle the reply can never arrive and this returns
    /// `Err(Error::Abandoned)`.
    pub async fn handle_async(&self, payload: &Value, transport: Transport) -> Result<Reply> {
        let (tx, rx) = oneshot::channel();
        self.handle(payload, transport, move |reply: Reply| {
            let _ = tx.send(reply);
        })?;
        rx.await.map_err(|_| Error::Abandoned)
    }

    /// Dispatch a request or batch, calling `continuation` exactly once
    pub fn dispatch(
        &self,
        payload: &Value,
        transport: Transport,
        continuation: Continuation,
    ) -> Result<()> {
        match payload {
            Value::Array(items) => self.dispatch_batch(items, transport, continuation),
            request => self.dispatch_single(request, transport, continuation),
        }
    }

    #[tracing::instrument(skip(self, items, transport, continuation), fields(batch_size = items.len()))]
    fn dispatch_batch(
        &self,
        items: &[Value],
        transport: Transport,
        continuation: Continuation,
    ) -> Result<()> {
        tracing::debug!("Dispatching batch");
        if let Some(metrics) = &self.metrics {
            metrics.record_batch(items.len() as u64);
        }

        let aggregator = BatchAggregator::new(items.len(), continuation);
        for (index, item) in items.iter().enumerate() {
            self.dispatch(item, Arc::clone(&transport), aggregator.slot(index))?;
        }
        Ok(())
    }

    fn dispatch_single(
        &self,
        request: &Value,
        transport: Transport,
        continuation: Continuation,
    ) -> Result<()> {
        let resolved = match resolve(request, &self.registry) {
            Ok(resolved) => resolved,
            Err(rejection) => {
                tracing::debug!(kind = %rejection.kind, id = %rejection.id, "Request rejected");
                if let Some(metrics) = &self.metrics {
                    metrics.record_rejection(rejection.kind);
                }
                continuation(Reply::Single(rejection.into_response()));
                return Ok(());
            }
        };

        self.invoke(resolved, transport, continuation)
    }

    fn invoke(&self, resolved: Resolved, transport: Transport, continuation: Continuation) -> Result<()> {
        let Resolved {
            name,
            method,
            args,
            id,
        } = resolved;
        tracing::debug!(method = %name, args = args.len(), "Invoking method");

        let delivery = Delivery::new(continuation);
        let done = Completion::new(delivery.clone(), id.clone(), name.clone(), self.metrics.clone());
        let invocation = Invocation::new(self.registry.clone(), transport, name.clone());

        delivery.begin_invocation();
        let outcome = catch_unwind(AssertUnwindSafe(|| method.call(invocation, args, done)));
        let abandoned = delivery.end_invocation();

        match outcome {
            Ok(Ok(())) => {
                if abandoned {
                    warn_pending(&name);
                }
                Ok(())
            }
            Ok(Err(fault)) => {
                self.report_fault(&name, &fault, id, &delivery);
                Err(Error::Fault(fault))
            }
            Err(panic) => {
                let fault = Fault::from_panic(panic.as_ref());
                self.report_fault(&name, &fault, id, &delivery);
                resume_unwind(panic)
            }
        }
    }

    fn report_fault(&self, name: &str, fault: &Fault, id: Option<Value>, delivery: &Delivery) {
        tracing::warn!(method = %name, error = %fault.message, "Method faulted");
        if let Some(metrics) = &self.metrics {
            metrics.record_fault(name);
        }

        let response = Response::failure(ErrorObject::from_fault(fault), id);
        if !delivery.deliver(Reply::Single(response)) {
            tracing::warn!(method = %name, "Fault after the method already completed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::{from_fn, from_sync_fn, no_transport};
    use crate::observer::CountingObserver;
    use serde_json::json;
    use std::sync::Mutex;

    fn dispatcher() -> Dispatcher {
        let registry = MethodRegistry::new();
        registry
            .register("echo", from_sync_fn(|args| Ok(args.into_iter().next().unwrap_or_default())))
            .unwrap();
        registry
            .register("boom", from_fn(|_cx, _args, _done| Err(Fault::new("boom"))))
            .unwrap();
        Dispatcher::new(registry)
    }

    fn run(dispatcher: &Dispatcher, payload: Value) -> (Result<()>, Option<Value>) {
        let out = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&out);
        let result = dispatcher.handle(&payload, no_transport(), move |reply: Reply| {
            *sink.lock().unwrap() = Some(reply.to_value());
        });
        let reply = out.lock().unwrap().take();
        (result, reply)
    }

    #[test]
    fn test_echo() {
        let (result, reply) = run(&dispatcher(), json!({"method": "echo", "params": [42], "id": 1}));
        assert!(result.is_ok());
        assert_eq!(reply, Some(json!({"id": 1, "error": null, "result": 42})));
    }

    #[test]
    fn test_notification_has_no_id() {
        let (_, reply) = run(&dispatcher(), json!({"method": "echo", "params": "x", "id": 0}));
        assert_eq!(reply, Some(json!({"error": null, "result": "x"})));
    }

    #[test]
    fn test_rejection_carries_request_id() {
        let (result, reply) = run(&dispatcher(), json!({"method": "missing", "params": [], "id": 0}));
        assert!(result.is_ok());
        let reply = reply.unwrap();
        assert_eq!(reply["error"]["code"], json!(-32601));
        assert_eq!(reply["id"], json!(0));
    }

    #[test]
    fn test_fault_is_reported_and_raised() {
        let (result, reply) = run(&dispatcher(), json!({"method": "boom", "params": [], "id": 5}));

        let reply = reply.unwrap();
        assert_eq!(reply["error"]["code"], json!(-32603));
        assert_eq!(reply["error"]["message"], json!("boom"));
        assert!(!reply["error"]["stack"].as_str().unwrap().is_empty());
        assert_eq!(reply["result"], Value::Null);
        assert_eq!(reply["id"], json!(5));

        match result {
            Err(Error::Fault(fault)) => assert_eq!(fault.message, "boom"),
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[test]
    fn test_fault_after_completion_does_not_reply_twice() {
        let registry = MethodRegistry::new();
        registry
            .register(
                "late",
                from_fn(|_cx, _args, done| {
                    done.ok(json!("done"));
                    Err(Fault::new("after"))
                }),
            )
            .unwrap();
        let dispatcher = Dispatcher::new(registry);

        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let result = dispatcher.handle(&json!({"method": "late", "params": []}), no_transport(), move |_| {
            *sink.lock().unwrap() += 1;
        });

        assert!(matches!(result, Err(Error::Fault(_))));
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_method_list_reflects_registry() {
        let dispatcher = dispatcher();
        let (_, reply) = run(&dispatcher, json!({"method": "rpc.methodList", "params": [], "id": 1}));
        assert_eq!(reply.unwrap()["result"], json!(["boom", "echo", "rpc.methodList"]));

        dispatcher.registry().unregister("boom");
        let (_, reply) = run(&dispatcher, json!({"method": "rpc.methodList", "params": [], "id": 1}));
        assert_eq!(reply.unwrap()["result"], json!(["echo", "rpc.methodList"]));
    }

    #[test]
    fn test_batch_of_sync_methods() {
        let (result, reply) = run(
            &dispatcher(),
            json!([
                {"method": "echo", "params": [1], "id": 1},
                {"params": [2], "id": 2},
                {"method": "echo", "params": [3], "id": 3}
            ]),
        );
        assert!(result.is_ok());
        let reply = reply.unwrap();
        assert_eq!(reply[0]["result"], json!(1));
        assert_eq!(reply[1]["error"]["code"], json!(-32600));
        assert_eq!(reply[2]["result"], json!(3));
    }

    #[test]
    fn test_observers_see_raw_payload() {
        let counter = Arc::new(CountingObserver::new());
        let dispatcher = Dispatcher::builder()
            .observer(counter.clone())
            .build()
            .unwrap();

        run(&dispatcher, json!("garbage"));
        run(&dispatcher, json!([]));
        assert_eq!(counter.count(), 2);
    }

    /// Log lines written while `f` runs
    fn captured_logs(f: impl FnOnce()) -> String {
        #[derive(Clone)]
        struct Buffer(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Buffer {
            fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(bytes);
                Ok(bytes.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buffer = Buffer(Arc::new(Mutex::new(Vec::new())));
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_fault_is_not_logged_as_pending() {
        let dispatcher = dispatcher();
        let logs = captured_logs(|| {
            let (_, reply) = run(&dispatcher, json!({"method": "boom", "params": [], "id": 1}));
            assert_eq!(reply.unwrap()["error"]["code"], json!(-32603));
        });

        assert!(logs.contains("Method faulted"));
        assert!(!logs.contains("request stays pending"), "{}", logs);
    }

    #[test]
    fn test_dropped_completion_is_logged_as_pending() {
        let registry = MethodRegistry::new();
        registry
            .register("lazy", from_fn(|_cx, _args, done| {
                drop(done);
                Ok(())
            }))
            .unwrap();
        let dispatcher = Dispatcher::new(registry);

        let logs = captured_logs(|| {
            let (result, reply) = run(&dispatcher, json!({"method": "lazy", "params": []}));
            assert!(result.is_ok());
            assert!(reply.is_none());
        });

        assert_eq!(logs.matches("request stays pending").count(), 1, "{}", logs);
    }
}
