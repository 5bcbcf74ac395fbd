//! Request and response shapes
//!
//! Inbound requests are handled as raw `serde_json::Value`s: the dispatcher
//! has to classify malformed payloads itself, so it never deserializes into
//! a strict request type. Outbound responses are typed.
//!
//! # Truthiness
//!
//! Presence of `method`, `params`, `id` and of a reported error is decided
//! by loose truthiness, the way the protocol's reference implementation
//! checks it: `null`, `false`, `0`, `NaN` and `""` count as absent, while
//! every array and object counts as present, even when empty. See
//! [`is_truthy`].
//!
//! # Response shape
//!
//! Both `result` and `error` are always serialized; exactly one of them is
//! non-null. `id` is omitted entirely when the response carries none.
//!
//! ```rust
//! use scoperpc_core::{Response, ErrorObject};
//! use serde_json::json;
//!
//! let ok = Response::success(json!(42), Some(json!(1)));
//! assert_eq!(
//!     serde_json::to_value(&ok).unwrap(),
//!     json!({"result": 42, "error": null, "id": 1})
//! );
//!
//! let notification = Response::success(json!("done"), None);
//! assert!(serde_json::to_value(&notification).unwrap().get("id").is_none());
//! ```

use crate::error::ErrorObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Loose truthiness of a JSON value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Truthiness of an optional field, where a missing field is falsy
pub fn is_present(value: Option<&Value>) -> bool {
    value.map_or(false, is_truthy)
}

/// Outgoing request, mainly for building payloads in clients and tests
///
/// ```rust
/// use scoperpc_core::Request;
/// use serde_json::json;
///
/// let payload = Request::new("echo", json!([42])).with_id(1).to_value();
/// assert_eq!(payload, json!({"method": "echo", "params": [42], "id": 1}));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Name of the method to invoke
    pub method: String,
    /// Positional params (array) or a single scalar/object param
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Correlation id; requests without a truthy id are notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl Request {
    /// Create a request without an id
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params: Some(params),
            id: None,
        }
    }

    /// Attach an id
    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Convert into the raw value the dispatcher consumes
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Content of a response's `error` field
///
/// Errors produced by the dispatcher itself are always `Object`. An
/// application-shaped error reported by a method is passed through as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseError {
    /// Error from the fixed taxonomy
    Object(ErrorObject),
    /// Application-defined error value, passed through verbatim
    Passthrough(Value),
}

impl ResponseError {
    /// The taxonomy error, if this is one
    pub fn as_object(&self) -> Option<&ErrorObject> {
        match self {
            ResponseError::Object(error) => Some(error),
            ResponseError::Passthrough(_) => None,
        }
    }

    /// Numeric code, when the error carries one
    pub fn code(&self) -> Option<i64> {
        match self {
            ResponseError::Object(error) => Some(error.code),
            ResponseError::Passthrough(value) => value.get("code").and_then(Value::as_i64),
        }
    }
}

impl From<ErrorObject> for ResponseError {
    fn from(error: ErrorObject) -> Self {
        ResponseError::Object(error)
    }
}

/// Response to a single request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Method result, null on error
    #[serde(default)]
    pub result: Value,
    /// Error, serialized as null on success
    pub error: Option<ResponseError>,
    /// Echoed request id, omitted when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl Response {
    /// Successful response
    pub fn success(result: Value, id: Option<Value>) -> Self {
        Self {
            result,
            error: None,
            id,
        }
    }

    /// Error response
    pub fn failure(error: impl Into<ResponseError>, id: Option<Value>) -> Self {
        Self {
            result: Value::Null,
            error: Some(error.into()),
            id,
        }
    }

    /// Check if the response carries an error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Check if the response carries a result
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The taxonomy error, if any
    pub fn error_object(&self) -> Option<&ErrorObject> {
        self.error.as_ref().and_then(ResponseError::as_object)
    }
}

/// Outcome of one dispatch: a single response or a batch of replies
///
/// Batches nest when the inbound payload nests arrays. `Batch` is listed
/// first so arrays never deserialize as a positional `Response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    /// Replies to a batch, in input order
    Batch(Vec<Reply>),
    /// Response to a single request
    Single(Response),
}

impl Reply {
    /// Check if this is a batch reply
    pub fn is_batch(&self) -> bool {
        matches!(self, Reply::Batch(_))
    }

    /// The single response, if this is not a batch
    pub fn as_single(&self) -> Option<&Response> {
        match self {
            Reply::Single(response) => Some(response),
            Reply::Batch(_) => None,
        }
    }

    /// The batch items, if this is a batch
    pub fn as_batch(&self) -> Option<&[Reply]> {
        match self {
            Reply::Single(_) => None,
            Reply::Batch(items) => Some(items),
        }
    }

    /// Check if this is a single response carrying an error
    ///
    /// Batches never count as errors, whatever their items contain.
    pub fn is_error(&self) -> bool {
        self.as_single().map_or(false, Response::is_error)
    }

    /// Convert to a JSON value
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Single(response)
    }
}
