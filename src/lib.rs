//! scoperpc - transport-agnostic JSON-RPC 2.0 dispatch
//!
//! This is the convenience crate that re-exports the scoperpc sub-crates.
//! Use it if you want a single dependency for the dispatcher and its types.
//!
//! # Architecture
//!
//! - **scoperpc-core**: wire types, error taxonomy, codec, observability
//! - **scoperpc-server**: registry, resolver, dispatcher, batch aggregation
//!   and response framing
//!
//! # Quick Start
//!
//! ```rust
//! use scoperpc::{from_sync_fn, no_transport, Dispatcher, FrameConfig};
//! use scoperpc::server::respond;
//!
//! let dispatcher = Dispatcher::builder()
//!     .method("ping", from_sync_fn(|_| Ok(serde_json::json!("pong"))))
//!     .build()
//!     .unwrap();
//!
//! let body = br#"{"method": "ping", "params": [], "id": 1}"#;
//! respond(&dispatcher, body, no_transport(), &FrameConfig::default(), |frame| {
//!     let frame = frame.unwrap();
//!     assert_eq!(frame.status, 200);
//!     println!("{}", frame.body);
//! })
//! .unwrap();
//! ```

// Re-export the sub-crates under short names
pub use scoperpc_core as core;
pub use scoperpc_server as server;

// Convenience re-exports of the most commonly used items
pub use scoperpc_core::{Error, ErrorObject, Fault, MethodError, Reply, Response, Result};
pub use scoperpc_server::{
    from_async_fn, from_fn, from_sync_fn, from_typed_fn, no_transport, Completion, Dispatcher,
    FrameConfig, Invocation, MethodRegistry,
};
