//! Response framing for request/response transports
//!
//! The dispatcher never serializes or writes headers. This module does the
//! transport-facing half: decoding a request body and turning a reply into
//! a status code, headers and body text that an HTTP server can write out
//! as is.

use crate::method::Transport;
use crate::Dispatcher;
use scoperpc_core::{codec, Reply, Result};
use serde_json::Value;

/// Content type of every framed reply
pub const CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Environment variable overriding the default CORS origin
pub const ALLOW_ORIGIN_ENV: &str = "SCOPERPC_ALLOW_ORIGIN";

/// Framing settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Value of `Access-Control-Allow-Origin`
    pub allow_origin: String,
}

impl FrameConfig {
    pub fn with_allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            allow_origin: std::env::var(ALLOW_ORIGIN_ENV).unwrap_or_else(|_| "*".to_string()),
        }
    }
}

/// A reply ready to be written by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Decode a request body
///
/// Text that is not JSON yields the parse-error reply to send back instead
/// of dispatching.
pub fn decode_body(body: &[u8]) -> std::result::Result<Value, Reply> {
    codec::decode_or_reply(body)
}

/// Serialize a reply and pick its status and headers
///
/// The status is 500 when a single reply carries an error and 200
/// otherwise; batches are always 200.
pub fn frame_reply(reply: &Reply, config: &FrameConfig) -> Result<Frame> {
    let body = codec::encode(reply)?;
    let status = if reply.is_error() { 500 } else { 200 };

    let headers = vec![
        ("Access-Control-Allow-Origin".to_string(), config.allow_origin.clone()),
        ("Content-Length".to_string(), body.len().to_string()),
        ("Content-Type".to_string(), CONTENT_TYPE.to_string()),
    ];

    Ok(Frame {
        status,
        headers,
        body,
    })
}

/// Decode `body`, dispatch it and frame the reply
///
/// `on_frame` is called once with the framed reply, or with the
/// serialization error if the reply could not be encoded. Undecodable
/// bodies are answered without reaching the dispatcher.
pub fn respond<F>(
    dispatcher: &Dispatcher,
    body: &[u8],
    transport: Transport,
    config: &FrameConfig,
    on_frame: F,
) -> Result<()>
where
    F: FnOnce(Result<Frame>) + Send + 'static,
{
    let payload = match decode_body(body) {
        Ok(payload) => payload,
        Err(reply) => {
            tracing::debug!(bytes = body.len(), "Undecodable request body");
            on_frame(frame_reply(&reply, config));
            return Ok(());
        }
    };

    let config = config.clone();
    dispatcher.handle(&payload, transport, move |reply: Reply| {
        on_frame(frame_reply(&reply, &config));
    })
}
