//! JSON text encoding and decoding at the edge of the dispatcher
//!
//! The dispatcher itself only sees decoded `serde_json::Value`s and only
//! produces typed replies. Transport adapters use these helpers on both
//! sides of it.
//!
//! # Examples
//!
//! ```rust
//! use scoperpc_core::{codec, Reply, Response};
//! use serde_json::json;
//!
//! let payload = codec::decode(br#"{"method":"echo","params":[1],"id":1}"#).unwrap();
//! assert_eq!(payload["method"], "echo");
//!
//! let reply = Reply::Single(Response::success(json!(1), Some(json!(1))));
//! let text = codec::encode(&reply).unwrap();
//! assert!(text.contains("\"result\":1"));
//! ```

use crate::error::{Error, ErrorObject, Result};
use crate::types::{Reply, Response};
use serde_json::Value;

/// Id used on responses to payloads whose id could not be read
pub const UNKNOWN_ID: i64 = -1;

/// Decode a request body into a JSON value
pub fn decode(bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a request body, turning undecodable text into a parse-error reply
///
/// The reply carries the unknown-id sentinel, since no id could be read.
pub fn decode_or_reply(bytes: &[u8]) -> std::result::Result<Value, Reply> {
    decode(bytes).map_err(|e| {
        tracing::debug!(error = %e, "Undecodable request body");
        Reply::Single(Response::failure(
            ErrorObject::parse_error(),
            Some(Value::from(UNKNOWN_ID)),
        ))
    })
}

/// Encode a reply to JSON text
pub fn encode(reply: &Reply) -> Result<String> {
    serde_json::to_string(reply).map_err(|e| Error::Serialization(e.to_string()))
}
