//! Method registry
//!
//! The registry maps method names to callables. It is owned by the
//! application and shared with the dispatcher by handle: clones point at
//! the same table, so methods registered or removed after the dispatcher
//! was built are visible to the very next request.
//!
//! # Reserved Names
//!
//! `rpc.methodList` is installed by the dispatcher and reflects the names
//! currently registered. Applications cannot register under it.
//!
//! # Examples
//!
//! ```rust
//! use scoperpc_server::{MethodRegistry, from_sync_fn};
//!
//! let registry = MethodRegistry::new();
//! registry
//!     .register("ping", from_sync_fn(|_| Ok(serde_json::json!("pong"))))
//!     .unwrap();
//!
//! assert!(registry.contains("ping"));
//! assert!(registry.register("rpc.methodList", from_sync_fn(|_| Ok(serde_json::Value::Null))).is_err());
//! ```

use crate::method::{from_fn, Method};
use scoperpc_core::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Name of the reflection method installed by the dispatcher
pub const METHOD_LIST: &str = "rpc.methodList";

type MethodTable = BTreeMap<String, Arc<dyn Method>>;

/// Shared, mutable map from method name to callable
///
/// Lookups clone the method's `Arc` and release the lock before the method
/// runs, so methods may themselves register or remove entries.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: Arc<RwLock<MethodTable>>,
}

impl MethodRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method, replacing any previous one under the same name
    pub fn register(&self, name: impl Into<String>, method: Box<dyn Method>) -> Result<()> {
        let name = name.into();
        if name == METHOD_LIST {
            return Err(Error::Config(format!("'{}' is a reserved method name", name)));
        }
        self.insert(name, method);
        Ok(())
    }

    /// Remove a method, returning whether it was registered
    pub fn unregister(&self, name: &str) -> bool {
        self.write().remove(name).is_some()
    }

    /// Get the method registered under `name`
    pub fn get(&self, name: &str) -> Option<Arc<dyn Method>> {
        self.read().get(name).cloned()
    }

    /// Check if a method is registered
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Names of all registered methods, in sorted order
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Number of registered methods
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if no method is registered
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Install the reflection method under its reserved name
    pub(crate) fn install_method_list(&self) {
        self.insert(
            METHOD_LIST.to_string(),
            from_fn(|cx, _args, done| {
                let names = cx.registry().names();
                done.ok(Value::from(names));
                Ok(())
            }),
        );
    }

    fn insert(&self, name: String, method: Box<dyn Method>) {
        if self.write().insert(name.clone(), Arc::from(method)).is_some() {
            tracing::debug!(method = %name, "Replaced registered method");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MethodTable> {
        self.methods.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MethodTable> {
        self.methods.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::from_sync_fn;
    use serde_json::json;

    fn constant(value: Value) -> Box<dyn Method> {
        from_sync_fn(move |_| Ok(value.clone()))
    }

    #[test]
    fn test_registry_basic() {
        let registry = MethodRegistry::new();
        registry.register("test", constant(json!(1))).unwrap();

        assert!(registry.contains("test"));
        assert!(!registry.contains("unknown"));
        assert!(registry.get("test").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clones_share_table() {
        let registry = MethodRegistry::new();
        let shared = registry.clone();

        registry.register("late", constant(json!(null))).unwrap();
        assert!(shared.contains("late"));

        assert!(shared.unregister("late"));
        assert!(!registry.contains("late"));
        assert!(!registry.unregister("late"));
    }

    #[test]
    fn test_reserved_name_rejected() {
        let registry = MethodRegistry::new();
        let result = registry.register(METHOD_LIST, constant(json!([])));
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_names_sorted() {
        let registry = MethodRegistry::new();
        registry.register("b", constant(json!(0))).unwrap();
        registry.register("a", constant(json!(0))).unwrap();
        registry.install_method_list();

        assert_eq!(registry.names(), vec!["a", "b", METHOD_LIST]);
    }
}
