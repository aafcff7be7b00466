//! Deferred queries

use std::fmt;
use std::sync::Arc;

use restq_domain::{ResourcePath, Result};
use serde_json::Value;
use uuid::Uuid;

use super::ports::{HttpMethod, PayloadCodec, TransportRequest};
use super::result::ResultSink;

/// What a query does to its target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Read,
    Create,
    Update,
    Delete,
    /// Invoke the named service operation on the target
    ServiceOperation(String),
}

impl QueryKind {
    pub fn method(&self) -> HttpMethod {
        match self {
            Self::Read => HttpMethod::Get,
            Self::Create | Self::ServiceOperation(_) => HttpMethod::Post,
            Self::Update => HttpMethod::Patch,
            Self::Delete => HttpMethod::Delete,
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Create => f.write_str("create"),
            Self::Update => f.write_str("update"),
            Self::Delete => f.write_str("delete"),
            Self::ServiceOperation(name) => write!(f, "invoke {name}"),
        }
    }
}

/// A unit of deferred work against a resource path.
///
/// Immutable once built. Construction validates nothing; addresses are
/// rendered when the request is built.
#[derive(Clone)]
pub struct Query {
    id: Uuid,
    kind: QueryKind,
    target: ResourcePath,
    payload: Option<Value>,
    sink: Option<Arc<dyn ResultSink>>,
}

impl Query {
    fn new(kind: QueryKind, target: ResourcePath, payload: Option<Value>) -> Self {
        Self { id: Uuid::new_v4(), kind, target, payload, sink: None }
    }

    pub fn read(target: ResourcePath) -> Self {
        Self::new(QueryKind::Read, target, None)
    }

    pub fn create(target: ResourcePath, payload: Value) -> Self {
        Self::new(QueryKind::Create, target, Some(payload))
    }

    pub fn update(target: ResourcePath, payload: Value) -> Self {
        Self::new(QueryKind::Update, target, Some(payload))
    }

    pub fn delete(target: ResourcePath) -> Self {
        Self::new(QueryKind::Delete, target, None)
    }

    pub fn service_operation(
        target: ResourcePath,
        name: impl Into<String>,
        parameters: Option<Value>,
    ) -> Self {
        Self::new(QueryKind::ServiceOperation(name.into()), target, parameters)
    }

    /// Attach the sink the response is demultiplexed into.
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    pub fn target(&self) -> &ResourcePath {
        &self.target
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn sink(&self) -> Option<&Arc<dyn ResultSink>> {
        self.sink.as_ref()
    }

    /// Id of the client result this query feeds, if any.
    pub fn result_id(&self) -> Option<Uuid> {
        self.sink.as_ref().and_then(|sink| sink.result_id())
    }

    pub fn method(&self) -> HttpMethod {
        self.kind.method()
    }

    /// Rendered address: the target path, plus the operation name for
    /// service operations.
    pub fn address(&self) -> String {
        match &self.kind {
            QueryKind::ServiceOperation(name) => self.target.child(name.as_str()).render(),
            _ => self.target.render(),
        }
    }

    /// Build the outgoing request, encoding the payload with `codec`.
    ///
    /// # Errors
    /// Returns `RestqError::Serialization` if the payload cannot be encoded.
    pub fn to_request(&self, codec: &dyn PayloadCodec) -> Result<TransportRequest> {
        let mut request = TransportRequest::new(self.id, self.method(), self.address());
        request.set_header("Accept", codec.content_type());
        if let Some(payload) = &self.payload {
            request.body = Some(codec.encode(payload)?);
            request.set_header("Content-Type", codec.content_type());
        }
        Ok(request)
    }

    pub fn summary(&self) -> QuerySummary {
        QuerySummary {
            id: self.id,
            kind: self.kind.clone(),
            method: self.method(),
            address: self.address(),
            payload: self.payload.clone(),
            has_sink: self.sink.is_some(),
        }
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("payload", &self.payload)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Owned snapshot of a pending query, for inspection and assertions
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySummary {
    pub id: Uuid,
    pub kind: QueryKind,
    pub method: HttpMethod,
    pub address: String,
    pub payload: Option<Value>,
    pub has_sink: bool,
}
