//! Query runtime: ports, queries, result sinks, the execution context and
//! the retry controller

mod context;
mod ports;
mod query;
mod result;
mod retry;

pub use context::{ClientContext, ClientContextBuilder, ExecutionStatus, HookStatus, QueryOutcome};
pub use ports::{
    HttpMethod, JsonCodec, PayloadCodec, Transport, TransportRequest, TransportResponse,
};
pub use query::{Query, QueryKind, QuerySummary};
pub use result::{ClientResult, Commit, ResultSink, ResultValue};
pub use retry::RetryOptions;
