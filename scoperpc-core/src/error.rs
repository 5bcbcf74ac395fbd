//! Error types for scoperpc
//!
//! This module covers three different failure surfaces of the dispatcher:
//!
//! - **Error**: operational errors surfaced to the caller of the dispatcher
//!   (uses thiserror)
//! - **ErrorObject** / **ErrorKind**: the wire-format error placed in the
//!   `error` field of a response, drawn from a fixed taxonomy
//! - **MethodError** and **Fault**: what a registered method reports, either
//!   through its completion handle or by failing synchronously
//!
//! # Error Codes
//!
//! The taxonomy is fixed and the numeric codes are part of the wire format:
//! - `-32700`: Parse error (payload is not a usable structured value)
//! - `-32600`: Invalid request (missing `method` or `params`)
//! - `-32601`: Method not found
//! - `-32603`: Internal error (method faulted or completed with a native error)
//!
//! # Examples
//!
//! ```rust
//! use scoperpc_core::{ErrorKind, ErrorObject};
//!
//! let error = ErrorObject::method_not_found();
//! assert_eq!(error.code, -32601);
//! assert_eq!(ErrorKind::MethodNotFound.code(), error.code);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use thiserror::Error;

/// Result type for scoperpc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message shared by parse errors and invalid requests
pub const INVALID_DATA_MESSAGE: &str = "Did not receive valid JSON-RPC data.";

/// Message carried by method-not-found errors
pub const METHOD_NOT_FOUND_MESSAGE: &str = "Requested method does not exist.";

/// Operational error surfaced by the dispatcher and its adapters
///
/// Classification failures (bad shape, unknown method) never show up here:
/// those become error responses. This enum only carries conditions the
/// caller of the dispatcher has to deal with itself.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A method failed synchronously while being invoked
    ///
    /// The dispatcher has already delivered an internal-error response for
    /// the request by the time this is returned.
    #[error("Method fault: {0}")]
    Fault(#[from] Fault),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The completion handle was dropped without ever being called
    ///
    /// Only the awaitable entry point reports this; the callback entry point
    /// simply never calls its continuation.
    #[error("Completion handle dropped without a response")]
    Abandoned,

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error not attributable to a method
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Kind of a protocol error, each with a stable numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Payload is not a usable structured value
    ParseError,
    /// Payload is an object but lacks `method` or `params`
    InvalidRequest,
    /// `method` is not present in the registry
    MethodNotFound,
    /// Method faulted, or completed with a native error
    InternalError,
}

impl ErrorKind {
    /// Wire code for this kind
    pub fn code(self) -> i64 {
        match self {
            ErrorKind::ParseError => -32700,
            ErrorKind::InvalidRequest => -32600,
            ErrorKind::MethodNotFound => -32601,
            ErrorKind::InternalError => -32603,
        }
    }

    /// Short label used in logs and metric attributes
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ParseError => "parse_error",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::MethodNotFound => "method_not_found",
            ErrorKind::InternalError => "internal_error",
        }
    }

    /// Look up the kind for a wire code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -32700 => Some(ErrorKind::ParseError),
            -32600 => Some(ErrorKind::InvalidRequest),
            -32601 => Some(ErrorKind::MethodNotFound),
            -32603 => Some(ErrorKind::InternalError),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire-format error object
///
/// Appears in the `error` field of a response. `stack` is only present when
/// the error originated from a synchronous method fault.
///
/// Unknown fields are rejected on deserialization so that application-defined
/// error objects with extra fields stay intact as a passthrough value (see
/// `ResponseError`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorObject {
    /// Numeric error code
    pub code: i64,

    /// Human-readable error message
    pub message: String,

    /// Captured backtrace of a method fault
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorObject {
    /// Create an error object with code and message
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            stack: None,
        }
    }

    /// Create an error object of the given kind
    pub fn of_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind.code(), message)
    }

    /// Parse error (-32700)
    pub fn parse_error() -> Self {
        Self::of_kind(ErrorKind::ParseError, INVALID_DATA_MESSAGE)
    }

    /// Invalid request error (-32600)
    pub fn invalid_request() -> Self {
        Self::of_kind(ErrorKind::InvalidRequest, INVALID_DATA_MESSAGE)
    }

    /// Method not found error (-32601)
    pub fn method_not_found() -> Self {
        Self::of_kind(ErrorKind::MethodNotFound, METHOD_NOT_FOUND_MESSAGE)
    }

    /// Internal error (-32603)
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::of_kind(ErrorKind::InternalError, message)
    }

    /// Internal error carrying the fault's message and stack
    pub fn from_fault(fault: &Fault) -> Self {
        Self {
            code: ErrorKind::InternalError.code(),
            message: fault.message.clone(),
            stack: Some(fault.stack.clone()),
        }
    }

    /// Kind of this error, if the code belongs to the taxonomy
    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.code)
    }
}

impl fmt::Display for ErrorObject {
    /// Formats as "[code] message"
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorObject {}

/// Error reported by a method through its completion handle
#[derive(Debug, Clone, PartialEq)]
pub enum MethodError {
    /// A native error value; becomes an internal error carrying its message
    Native(String),

    /// An application-shaped error value, passed through verbatim
    ///
    /// A falsy value here (null, false, 0, "") counts as no error at all.
    Structured(Value),
}

impl MethodError {
    /// Wrap any displayable error as a native error
    pub fn native(err: impl fmt::Display) -> Self {
        MethodError::Native(err.to_string())
    }

    /// Wrap an application-defined error value
    pub fn structured(value: Value) -> Self {
        MethodError::Structured(value)
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodError::Native(message) => f.write_str(message),
            MethodError::Structured(value) => write!(f, "{}", value),
        }
    }
}

impl From<ErrorObject> for MethodError {
    fn from(error: ErrorObject) -> Self {
        match serde_json::to_value(&error) {
            Ok(value) => MethodError::Structured(value),
            Err(e) => MethodError::Native(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for MethodError {
    fn from(err: serde_json::Error) -> Self {
        MethodError::native(err)
    }
}

/// Synchronous failure of a method invocation
///
/// Carries the message and a backtrace captured where the fault was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Human-readable message
    pub message: String,
    /// Captured backtrace, never empty
    pub stack: String,
}

impl Fault {
    /// Create a fault, capturing the current backtrace
    pub fn new(message: impl Into<String>) -> Self {
        let mut stack = Backtrace::force_capture().to_string();
        if stack.is_empty() {
            stack = "<no backtrace>".to_string();
        }
        Self {
            message: message.into(),
            stack,
        }
    }

    /// Build a fault from any error value
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self::new(err.to_string())
    }

    /// Build a fault from a panic payload
    ///
    /// String payloads become the message; anything else yields an empty one.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::new()
        };
        Self::new(message)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Fault {}
