//! Builder for constructing dispatchers
//!
//! The builder provides a fluent API for configuring and creating a
//! `Dispatcher`. It allows you to:
//! - Share an existing registry or start from an empty one
//! - Register methods
//! - Add message observers
//! - Enable dispatch metrics
//!
//! # Examples
//!
//! ```rust
//! use scoperpc_server::{Dispatcher, LoggingObserver, from_sync_fn};
//!
//! let dispatcher = Dispatcher::builder()
//!     .method("ping", from_sync_fn(|_| Ok(serde_json::json!("pong"))))
//!     .observe(LoggingObserver::new())
//!     .with_metrics("my-service")
//!     .build()
//!     .unwrap();
//!
//! assert!(dispatcher.registry().contains("ping"));
//! ```

use crate::method::Method;
use crate::metrics::DispatchMetrics;
use crate::observer::{MessageObserver, ObserverList};
use crate::registry::MethodRegistry;
use crate::Dispatcher;
use scoperpc_core::Result;
use std::sync::Arc;

/// Builder for constructing a dispatcher
pub struct DispatcherBuilder {
    registry: MethodRegistry,
    methods: Vec<(String, Box<dyn Method>)>,
    observers: ObserverList,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl DispatcherBuilder {
    /// Create a new dispatcher builder
    pub fn new() -> Self {
        Self {
            registry: MethodRegistry::new(),
            methods: Vec::new(),
            observers: ObserverList::new(),
            metrics: None,
        }
    }

    /// Resolve against an existing registry instead of a fresh one
    pub fn registry(mut self, registry: MethodRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register a method
    ///
    /// Registration happens in `build`, which reports reserved names.
    pub fn method(mut self, name: impl Into<String>, method: Box<dyn Method>) -> Self {
        self.methods.push((name.into(), method));
        self
    }

    /// Add a message observer
    pub fn observe<O: MessageObserver + 'static>(self, observer: O) -> Self {
        self.observer(Arc::new(observer))
    }

    /// Add a shared message observer
    pub fn observer(mut self, observer: Arc<dyn MessageObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    /// Record metrics into `metrics`
    pub fn metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Record metrics on the global meter provider under `service_name`
    pub fn with_metrics(self, service_name: impl Into<String>) -> Self {
        self.metrics(Arc::new(DispatchMetrics::new(service_name)))
    }

    /// Build the dispatcher
    pub fn build(self) -> Result<Dispatcher> {
        for (name, method) in self.methods {
            self.registry.register(name, method)?;
        }

        tracing::debug!(
            methods = self.registry.len(),
            observers = self.observers.len(),
            metrics = self.metrics.is_some(),
            "Dispatcher built"
        );

        Ok(Dispatcher::from_parts(self.registry, self.observers, self.metrics))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::from_sync_fn;
    use crate::registry::METHOD_LIST;
    use scoperpc_core::Error;
    use serde_json::json;

    #[test]
    fn test_builder_registers_methods() {
        let dispatcher = DispatcherBuilder::new()
            .method("a", from_sync_fn(|_| Ok(json!(1))))
            .method("b", from_sync_fn(|_| Ok(json!(2))))
            .build()
            .unwrap();

        assert_eq!(dispatcher.registry().names(), vec!["a", "b", METHOD_LIST]);
    }

    #[test]
    fn test_builder_shares_registry() {
        let registry = MethodRegistry::new();
        let dispatcher = DispatcherBuilder::new()
            .registry(registry.clone())
            .build()
            .unwrap();

        registry.register("later", from_sync_fn(|_| Ok(json!(null)))).unwrap();
        assert!(dispatcher.registry().contains("later"));
    }

    #[test]
    fn test_builder_rejects_reserved_name() {
        let result = DispatcherBuilder::new()
            .method(METHOD_LIST, from_sync_fn(|_| Ok(json!([]))))
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
