//! Transport and codec port interfaces
//!
//! The engine never talks HTTP directly. It hands a FIFO batch of
//! [`TransportRequest`]s to a [`Transport`] and expects exactly one
//! [`TransportResponse`] back per request, in the same order.

use std::fmt;

use async_trait::async_trait;
use restq_domain::{RestqError, Result};
use serde_json::Value;
use uuid::Uuid;

/// HTTP verb a query maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing request, built from a pending query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Id of the query this request was built from
    pub query_id: Uuid,
    pub method: HttpMethod,
    /// Address relative to the service root, e.g. `me/profile`
    pub address: String,
    pub body: Option<Vec<u8>>,
    pub headers: Vec<(String, String)>,
}

impl TransportRequest {
    pub fn new(query_id: Uuid, method: HttpMethod, address: impl Into<String>) -> Self {
        Self { query_id, method, address: address.into(), body: None, headers: Vec::new() }
    }

    /// First header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Body decoded as UTF-8, lossily. Handy for logging and assertions.
    pub fn body_text(&self) -> Option<String> {
        self.body.as_deref().map(|body| String::from_utf8_lossy(body).into_owned())
    }
}

/// Raw server reply for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    /// 200 with a JSON body.
    pub fn json(value: &Value) -> Self {
        Self::new(200, value.to_string())
    }

    /// 204 with no body.
    pub fn no_content() -> Self {
        Self::new(204, Vec::new())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for sending a batch of requests to the remote service
///
/// Implementations may send the requests one by one or bundle them, but must
/// return one response per request in submission order. A transport-level
/// failure (connection refused, timeout) fails the whole batch.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn submit(&self, batch: &[TransportRequest]) -> Result<Vec<TransportResponse>>;
}

/// Trait for the wire format of payloads and responses
pub trait PayloadCodec: Send + Sync {
    /// Value for the `Content-Type` and `Accept` headers
    fn content_type(&self) -> &'static str;

    fn encode(&self, value: &Value) -> Result<Vec<u8>>;

    /// Decode a response body. An empty body decodes to `Value::Null`.
    fn decode(&self, body: &[u8]) -> Result<Value>;
}

/// JSON codec backed by serde_json
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| RestqError::Serialization(e.to_string()))
    }

    fn decode(&self, body: &[u8]) -> Result<Value> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(body).map_err(|e| RestqError::Deserialization(e.to_string()))
    }
}
