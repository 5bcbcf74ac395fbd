//! Payload observers
//!
//! Observers see every top-level payload handed to the dispatcher, before
//! any validation, in registration order. They cannot change or stop
//! dispatch; a panicking observer is logged and skipped.
//!
//! # Built-in Observers
//!
//! - **LoggingObserver**: logs each payload through `tracing`
//! - **CountingObserver**: counts payloads
//!
//! # Examples
//!
//! ```rust
//! use scoperpc_server::{Dispatcher, LoggingObserver};
//!
//! let dispatcher = Dispatcher::builder()
//!     .observe(LoggingObserver::new())
//!     .observe(|payload: &serde_json::Value| {
//!         println!("payload: {}", payload);
//!     })
//!     .build()
//!     .unwrap();
//! # let _ = dispatcher;
//! ```

use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receives each raw top-level payload
pub trait MessageObserver: Send + Sync {
    fn on_message(&self, payload: &Value);
}

impl<F> MessageObserver for F
where
    F: Fn(&Value) + Send + Sync,
{
    fn on_message(&self, payload: &Value) {
        self(payload)
    }
}

/// Ordered list of observers
#[derive(Clone, Default)]
pub struct ObserverList {
    observers: Vec<Arc<dyn MessageObserver>>,
}

impl ObserverList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer
    pub fn add(&mut self, observer: Arc<dyn MessageObserver>) {
        self.observers.push(observer);
    }

    /// Notify every observer of `payload`
    pub fn notify(&self, payload: &Value) {
        for (index, observer) in self.observers.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| observer.on_message(payload)));
            if outcome.is_err() {
                tracing::warn!(observer = index, "Message observer panicked");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.observers.len())
            .finish()
    }
}

/// Built-in logging observer
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl LoggingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl MessageObserver for LoggingObserver {
    fn on_message(&self, payload: &Value) {
        let kind = match payload {
            Value::Array(items) => format!("batch[{}]", items.len()),
            Value::Object(_) => "single".to_string(),
            _ => "other".to_string(),
        };
        let preview: String = payload.to_string().chars().take(100).collect();
        tracing::info!(kind = %kind, payload = %preview, "Payload received");
    }
}

/// Built-in counting observer
#[derive(Debug, Default)]
pub struct CountingObserver {
    count: AtomicU64,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads seen so far
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl MessageObserver for CountingObserver {
    fn on_message(&self, _payload: &Value) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_observers_run_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut list = ObserverList::new();
        for name in ["first", "second"] {
            let seen = Arc::clone(&seen);
            list.add(Arc::new(move |_: &Value| seen.lock().unwrap().push(name)));
        }

        list.notify(&json!({"method": "x"}));
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_panicking_observer_is_skipped() {
        let counter = Arc::new(CountingObserver::new());
        let mut list = ObserverList::new();
        list.add(Arc::new(|_: &Value| panic!("observer failure")));
        list.add(counter.clone());

        list.notify(&json!([]));
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_logging_observer() {
        let observer = LoggingObserver::new();
        observer.on_message(&json!([{"method": "a"}, {"method": "b"}]));
        observer.on_message(&json!("not a request"));
    }
}
