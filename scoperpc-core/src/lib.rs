//! Wire types, error taxonomy and observability for scoperpc
//!
//! This crate holds everything the dispatcher and its adapters share:
//!
//! - **Types**: response and reply shapes, loose truthiness of JSON values
//! - **Error handling**: the fixed protocol error taxonomy, method errors
//!   and faults, and the operational `Error` enum
//! - **Codec**: JSON text decoding/encoding used at the transport edge
//! - **Observability**: `tracing` subscriber and OpenTelemetry setup
//!
//! The dispatch pipeline itself lives in `scoperpc-server`.
//!
//! # Example
//!
//! ```rust
//! use scoperpc_core::{ErrorObject, Reply, Response};
//! use serde_json::json;
//!
//! let reply = Reply::Single(Response::failure(ErrorObject::invalid_request(), Some(json!(-1))));
//! assert!(reply.is_error());
//! assert_eq!(reply.to_value()["error"]["code"], -32600);
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use error::{Error, ErrorKind, ErrorObject, Fault, MethodError, Result};
pub use observability::{
    init_observability, shutdown_observability, ObservabilityConfig, TelemetryProviders,
};
pub use types::{is_present, is_truthy, Reply, Request, Response, ResponseError};
