//! Integration tests for the retry controller

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use restq_core::testing::ScriptedTransport;
use restq_core::{ClientContext, ClientResult, Query, RetryOptions, TransportResponse};
use restq_domain::{ResourcePath, RestqError, RetrySettings};
use serde_json::{json, Value};
use tokio::time::Instant;

fn setup() -> (Arc<ScriptedTransport>, Arc<ClientContext>) {
    let transport = Arc::new(ScriptedTransport::new());
    let context = ClientContext::new(transport.clone());
    (transport, context)
}

fn network_error() -> RestqError {
    RestqError::Network("connection reset by peer".into())
}

/// Options with no delay and counting callbacks.
fn counting_options(
    max_retry: u32,
    successes: &Arc<AtomicU32>,
    failures: &Arc<AtomicU32>,
) -> RetryOptions {
    let successes = successes.clone();
    let failures = failures.clone();
    RetryOptions::new()
        .max_retry(max_retry)
        .delay(Duration::ZERO)
        .on_success(move || {
            successes.fetch_add(1, Ordering::SeqCst);
        })
        .on_failure(move |_| {
            failures.fetch_add(1, Ordering::SeqCst);
        })
}

#[tokio::test]
async fn test_transient_failures_are_retried_until_success() {
    let (transport, context) = setup();
    let result = ClientResult::new(context.clone(), Value::Null);
    context.add_query(Query::read(ResourcePath::from("me")).with_sink(result.sink()));
    transport.fail_times(2, network_error()).respond_json(vec![json!({"id": "me"})]);
    let (successes, failures) = (Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0)));
    let retried = Arc::new(Mutex::new(Vec::new()));
    let retried_clone = retried.clone();
    let options = counting_options(3, &successes, &failures)
        .on_retry(move |attempt, _| retried_clone.lock().unwrap().push(attempt));

    context.execute_query_retry(options).await.unwrap();

    assert_eq!(transport.call_count(), 3);
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(failures.load(Ordering::SeqCst), 0);
    assert_eq!(*retried.lock().unwrap(), vec![1, 2]);
    assert_eq!(result.value(), json!({"id": "me"}));
    assert_eq!(context.pending_count(), 0);
}

#[tokio::test]
async fn test_each_attempt_resends_the_same_batch() {
    let (transport, context) = setup();
    context.add_query(Query::read(ResourcePath::from("a")));
    context.add_query(Query::delete(ResourcePath::from("b")));
    transport.fail(network_error());

    context
        .execute_query_retry(RetryOptions::new().max_retry(1).delay(Duration::ZERO))
        .await
        .unwrap();

    let batches = transport.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0], batches[1]);
}

#[tokio::test]
async fn test_permanent_failure_exhausts_attempts() {
    let (transport, context) = setup();
    context.add_query(Query::read(ResourcePath::from("me")));
    transport.fail_always(network_error());
    let (successes, failures) = (Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0)));

    let err =
        context.execute_query_retry(counting_options(2, &successes, &failures)).await.unwrap_err();

    assert_eq!(transport.call_count(), 3);
    assert_eq!(successes.load(Ordering::SeqCst), 0);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(err.attempts(), 3);
    assert_eq!(err.root_cause(), &network_error());
    assert_eq!(context.pending_count(), 1);
}

#[tokio::test]
async fn test_zero_retries_is_a_single_attempt() {
    let (transport, context) = setup();
    context.add_query(Query::read(ResourcePath::from("me")));
    transport.fail_always(network_error());
    let (successes, failures) = (Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0)));

    let err =
        context.execute_query_retry(counting_options(0, &successes, &failures)).await.unwrap_err();

    assert_eq!(transport.call_count(), 1);
    assert_eq!(err, network_error());
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_if_stops_on_non_retryable_errors() {
    let (transport, context) = setup();
    context.add_query(Query::read(ResourcePath::from("sites/missing")));
    transport.respond(vec![TransportResponse::new(404, "Not Found")]);
    let failures = Arc::new(AtomicU32::new(0));
    let failures_clone = failures.clone();
    let options = RetryOptions::new()
        .max_retry(4)
        .delay(Duration::ZERO)
        .retry_if(RestqError::is_retryable)
        .on_failure(move |_| {
            failures_clone.fetch_add(1, Ordering::SeqCst);
        });

    let err = context.execute_query_retry(options).await.unwrap_err();

    assert_eq!(transport.call_count(), 1);
    assert_eq!(err.status(), Some(404));
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_client_result_retry_convenience() {
    let (transport, context) = setup();
    let entity = restq_core::Entity::untyped(context.clone(), ResourcePath::from("me"));
    let flag = entity.invoke_for("IsFollowing", None, false);
    transport.fail(RestqError::http(503, "me/IsFollowing", "busy"));
    transport.respond_json(vec![json!({"value": true})]);

    flag.execute_query_retry(RetryOptions::new().max_retry(1).delay(Duration::ZERO))
        .await
        .unwrap();

    assert!(flag.value());
}

#[test]
fn test_default_options_follow_context_settings() {
    let transport = Arc::new(ScriptedTransport::new());
    let settings = RetrySettings { max_retry: 2, delay: Duration::from_millis(250) };
    let context = ClientContext::builder(transport).retry_settings(settings).build();

    let options = context.default_retry_options();

    assert_eq!(options.max_retry_count(), 2);
    assert_eq!(options.retry_delay(), Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn test_fixed_delay_is_waited_between_attempts() {
    let (transport, context) = setup();
    context.add_query(Query::read(ResourcePath::from("me")));
    transport.fail_times(2, network_error()).respond_json(vec![json!({})]);
    let failed_at = Arc::new(Mutex::new(Vec::new()));
    let failed_at_clone = failed_at.clone();
    let options = RetryOptions::new()
        .max_retry(2)
        .delay(Duration::from_secs(5))
        .on_retry(move |_, _| failed_at_clone.lock().unwrap().push(Instant::now()));

    let started = Instant::now();
    context.execute_query_retry(options).await.unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(10));
    let failed_at = failed_at.lock().unwrap();
    assert_eq!(failed_at.len(), 2);
    // Same gap both times: the delay does not grow between attempts
    assert_eq!(failed_at[1] - failed_at[0], Duration::from_secs(5));
    assert_eq!(transport.call_count(), 3);
}
