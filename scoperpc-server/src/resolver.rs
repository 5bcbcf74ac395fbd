//! Request validation and method resolution
//!
//! Classifies one decoded request value, short-circuiting on the first
//! failing check:
//!
//! 1. the request must be an object, else **parse error**
//! 2. `method` and `params` must both be truthy, else **invalid request**
//! 3. `method` must be registered, else **method not found**
//!
//! Presence is loose truthiness (see `scoperpc_core::is_truthy`): `0`, `""`
//! and `false` count as missing, empty arrays and objects do not.

use crate::method::Method;
use crate::registry::MethodRegistry;
use scoperpc_core::codec::UNKNOWN_ID;
use scoperpc_core::{is_present, is_truthy, ErrorKind, ErrorObject, Response};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// A request that passed validation and names a registered method
pub struct Resolved {
    /// Method name as looked up in the registry
    pub name: String,
    /// The resolved callable
    pub method: Arc<dyn Method>,
    /// Positional arguments, before the completion handle
    pub args: Vec<Value>,
    /// Id to echo on the response; `None` for notifications
    pub id: Option<Value>,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("id", &self.id)
            .finish()
    }
}

/// A request that failed validation or resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Which check failed
    pub kind: ErrorKind,
    /// Wire error for the response
    pub error: ErrorObject,
    /// The request's own `id` property, or the unknown-id sentinel
    pub id: Value,
}

impl Rejection {
    fn new(kind: ErrorKind, request: Option<&Map<String, Value>>) -> Self {
        let error = match kind {
            ErrorKind::ParseError => ErrorObject::parse_error(),
            ErrorKind::InvalidRequest => ErrorObject::invalid_request(),
            ErrorKind::MethodNotFound => ErrorObject::method_not_found(),
            ErrorKind::InternalError => ErrorObject::internal_error(""),
        };
        Self {
            kind,
            error,
            id: rejection_id(request),
        }
    }

    /// Convert into the error response for this request
    ///
    /// Unlike completed requests, rejected ones always carry an id.
    pub fn into_response(self) -> Response {
        Response::failure(self.error, Some(self.id))
    }
}

/// Validate a request and resolve its method against the registry
pub fn resolve(request: &Value, registry: &MethodRegistry) -> Result<Resolved, Rejection> {
    let Some(obj) = request.as_object() else {
        return Err(Rejection::new(ErrorKind::ParseError, None));
    };

    if !is_present(obj.get("method")) || !is_present(obj.get("params")) {
        return Err(Rejection::new(ErrorKind::InvalidRequest, Some(obj)));
    }

    let method = obj
        .get("method")
        .and_then(method_name)
        .and_then(|name| registry.get(&name).map(|method| (name, method)));

    let Some((name, method)) = method else {
        return Err(Rejection::new(ErrorKind::MethodNotFound, Some(obj)));
    };

    Ok(Resolved {
        name,
        method,
        args: marshal_args(obj.get("params")),
        id: obj.get("id").filter(|id| is_truthy(id)).cloned(),
    })
}

/// Build the positional argument list from `params`
///
/// An array spreads into its elements, any other truthy value becomes the
/// single argument, and a missing or falsy value yields no arguments.
pub fn marshal_args(params: Option<&Value>) -> Vec<Value> {
    match params {
        Some(Value::Array(items)) => items.clone(),
        Some(value) if is_present(Some(value)) => vec![value.clone()],
        _ => Vec::new(),
    }
}

/// Registry key for a `method` value
///
/// Strings are used as is; numbers and booleans use their JSON text.
/// Arrays join their elements with `,`, with `null` as an empty element.
/// Objects have no key.
fn method_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => Some(String::new()),
                other => method_name(other),
            })
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(",")),
        Value::Null | Value::Object(_) => None,
    }
}

fn rejection_id(request: Option<&Map<String, Value>>) -> Value {
    request
        .and_then(|obj| obj.get("id"))
        .cloned()
        .unwrap_or(Value::from(UNKNOWN_ID))
}
