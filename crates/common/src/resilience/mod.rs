//! Resilience patterns for fault tolerance
//!
//! Provides a **generic** retry executor with a fixed delay between attempts
//! and pluggable retry policies. The executor is generic over the operation's
//! error type, so the query engine can drive it with its own error enum while
//! keeping the delay and attempt bookkeeping here.

pub mod retry;

pub use retry::{
    policies, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError, RetryExecutor,
    RetryOutcome, RetryPolicy, RetryResult,
};
