//! Transport-agnostic JSON-RPC 2.0 dispatcher
//!
//! This crate takes decoded JSON payloads, validates each request, resolves
//! its method against an application-owned registry, invokes the method with
//! a completion handle, and hands a single reply to a continuation. It
//! never opens sockets: a transport decodes bodies, passes them in, and
//! writes out whatever the continuation receives (see [`frame`]).
//!
//! # Core Features
//!
//! - **Shared registry**: methods added or removed after construction are
//!   visible to the next request
//! - **Callback completion**: methods report synchronously or from any task
//! - **Ordered batches**: replies follow input order, whatever the
//!   completion order
//! - **Reflection**: the reserved `rpc.methodList` method lists registered names
//! - **Observers**: hooks that see every raw payload before validation
//! - **Observability**: `tracing` logs and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust
//! use scoperpc_server::{from_typed_fn, no_transport, Dispatcher};
//! use scoperpc_core::MethodError;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Dispatcher::builder()
//!         .method("add", from_typed_fn(|(a, b): (i64, i64)| async move {
//!             Ok::<_, MethodError>(a + b)
//!         }))
//!         .build()?;
//!
//!     let payload = json!({"method": "add", "params": [5, 3], "id": 1});
//!     let reply = dispatcher.handle_async(&payload, no_transport()).await?;
//!     assert_eq!(reply.to_value()["result"], 8);
//!     Ok(())
//! }
//! ```
//!
//! # Request Lifecycle
//!
//! `Received → Validating → Rejected | Resolved → Invoking → Completed`
//!
//! Rejected requests are answered immediately with a protocol error. A
//! resolved request completes when its method calls the completion handle;
//! a method that never does leaves the request (and its batch) pending.

mod batch;
mod builder;
mod completion;
mod dispatcher;
pub mod frame;
mod method;
mod metrics;
mod observer;
mod registry;
mod resolver;

pub use batch::BatchAggregator;
pub use builder::DispatcherBuilder;
pub use completion::{shape_response, Completion, Continuation};
pub use dispatcher::Dispatcher;
pub use frame::{decode_body, frame_reply, respond, Frame, FrameConfig};
pub use method::{
    from_async_fn, from_fn, from_sync_fn, from_typed_fn, no_transport, FnMethod, Invocation,
    Method, Transport,
};
pub use metrics::DispatchMetrics;
pub use observer::{CountingObserver, LoggingObserver, MessageObserver, ObserverList};
pub use registry::{MethodRegistry, METHOD_LIST};
pub use resolver::{marshal_args, resolve, Rejection, Resolved};
