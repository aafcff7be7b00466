//! # Restq Core
//!
//! The deferred query execution engine - no HTTP or platform code.
//!
//! This crate contains:
//! - Port interfaces for the transport and the payload codec
//! - The entity model: property stores, client values, collections
//! - Queries, result sinks and the execution context that flushes them
//! - The retry controller
//! - A handful of representative entity types
//!
//! ## Architecture Principles
//! - Only depends on `restq-common` and `restq-domain`
//! - All I/O goes through the [`Transport`] trait
//! - Nothing reaches the network until `execute_query` is called

pub mod entities;
pub mod model;
pub mod runtime;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use model::{
    defaults, ClientValue, ClientValueCollection, ClientValueType, Entity, EntityCollection,
    EntityType, PropertyDefault, PropertyStore, PropertyValue, RawCollection,
};
pub use runtime::{
    ClientContext, ClientContextBuilder, ClientResult, ExecutionStatus, HookStatus, HttpMethod,
    JsonCodec, PayloadCodec, Query, QueryKind, QueryOutcome, QuerySummary, ResultSink,
    ResultValue, RetryOptions, Transport, TransportRequest, TransportResponse,
};

#[doc(hidden)]
pub mod __private {
    pub use restq_domain::Result;
    pub use serde_json::Value;
}
