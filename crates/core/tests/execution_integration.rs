//! Integration tests for batch execution: ordering, two-phase
//! demultiplexing, hooks and re-entrancy.

use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use restq_core::testing::ScriptedTransport;
use restq_core::{
    ClientContext, ClientResult, Entity, ExecutionStatus, HookStatus, Query, Transport,
    TransportRequest, TransportResponse,
};
use restq_domain::{ResourcePath, RestqError, Result};
use serde_json::{json, Value};

fn setup() -> (Arc<ScriptedTransport>, Arc<ClientContext>) {
    let transport = Arc::new(ScriptedTransport::new());
    let context = ClientContext::new(transport.clone());
    (transport, context)
}

fn read_into(context: &Arc<ClientContext>, address: &str) -> ClientResult<Value> {
    let result = ClientResult::new(context.clone(), Value::Null);
    context.add_query(Query::read(ResourcePath::from(address)).with_sink(result.sink()));
    result
}

#[tokio::test]
async fn test_retrieve_populates_entity_with_response() {
    let (transport, context) = setup();
    let entity = Entity::untyped(context.clone(), ResourcePath::from("A/B"));
    transport.respond_json(vec![json!({"x": 1})]);

    entity.get().execute_query().await.unwrap();

    assert_eq!(entity.to_json(), json!({"x": 1}));
    assert_eq!(transport.last_batch().unwrap()[0].address, "A/B");
    assert_eq!(context.pending_count(), 0);
}

#[tokio::test]
async fn test_each_sink_gets_the_response_at_its_position() {
    let (transport, context) = setup();
    let results: Vec<_> = ["a", "b", "c"].iter().map(|addr| read_into(&context, addr)).collect();
    transport.respond_json(vec![json!({"n": 0}), json!({"n": 1}), json!({"n": 2})]);

    context.execute_query().await.unwrap();

    for (index, result) in results.iter().enumerate() {
        assert_eq!(result.value(), json!({ "n": index }));
    }
    let sent: Vec<String> =
        transport.last_batch().unwrap().into_iter().map(|request| request.address).collect();
    assert_eq!(sent, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_malformed_body_leaves_every_sink_and_the_queue_untouched() {
    let (transport, context) = setup();
    let first = read_into(&context, "first");
    let collection = context.collection::<restq_core::entities::ConditionalAccessPolicy>("cap");
    collection.get();
    let before = context.pending_queries();
    transport.respond(vec![
        TransportResponse::json(&json!({"ok": true})),
        TransportResponse::json(&json!("not a collection")),
    ]);

    let err = context.execute_query().await.unwrap_err();

    assert!(matches!(err, RestqError::Deserialization(_)));
    assert_eq!(first.value(), Value::Null);
    assert!(collection.is_empty());
    assert_eq!(context.pending_queries(), before);
    assert_eq!(context.status(), ExecutionStatus::Failed);
}

#[tokio::test]
async fn test_failed_context_can_execute_again() {
    let (transport, context) = setup();
    let result = read_into(&context, "me");
    transport.fail(RestqError::Timeout(std::time::Duration::from_secs(30)));
    transport.respond_json(vec![json!({"id": "me"})]);

    assert!(context.execute_query().await.is_err());
    context.execute_query().await.unwrap();

    assert_eq!(result.value(), json!({"id": "me"}));
    assert_eq!(context.status(), ExecutionStatus::Idle);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_update_payload_contains_only_persisted_changes() {
    let (transport, context) = setup();
    let entity = Entity::untyped(context.clone(), ResourcePath::from("me/events/1"));
    entity.set_property("Id", "1", false);
    entity.set_property("Subject", "Hi", true);

    assert_eq!(entity.update_payload(), json!({"Subject": "Hi"}));
    entity.update().execute_query().await.unwrap();

    let request = &transport.last_batch().unwrap()[0];
    assert_eq!(request.body_text().as_deref(), Some(r#"{"Subject":"Hi"}"#));
    assert!(entity.dirty_properties().is_empty());
}

#[tokio::test]
async fn test_before_hook_can_attach_headers() {
    let (transport, context) = setup();
    context.before_query_execute(|_context, request| {
        request.set_header("Authorization", "Bearer test-token");
    });
    read_into(&context, "me");
    read_into(&context, "me/drive");

    context.execute_query().await.unwrap();

    let batch = transport.last_batch().unwrap();
    assert!(batch.iter().all(|r| r.header("authorization") == Some("Bearer test-token")));
}

#[tokio::test]
async fn test_after_execute_fires_once_for_its_own_result() {
    let (transport, context) = setup();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let other = read_into(&context, "other");
    let target = read_into(&context, "target");
    let seen_clone = seen.clone();
    target.after_execute(move |result| seen_clone.lock().unwrap().push(result.value()));
    transport.respond_json(vec![json!(1), json!(2)]);

    context.execute_query().await.unwrap();
    read_into(&context, "again");
    context.execute_query().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![json!(2)]);
    assert_eq!(other.value(), json!(1));
}

#[tokio::test]
async fn test_after_hook_sees_every_outcome_in_order() {
    let (transport, context) = setup();
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let statuses_clone = statuses.clone();
    context.after_query_execute(move |_context, outcome| {
        statuses_clone.lock().unwrap().push((outcome.query.address(), outcome.status));
        HookStatus::Keep
    });
    context.add_query(Query::delete(ResourcePath::from("items/1")));
    context.add_query(Query::read(ResourcePath::from("items")));
    transport.respond(vec![TransportResponse::no_content(), TransportResponse::json(&json!([]))]);

    context.execute_query().await.unwrap();

    assert_eq!(
        *statuses.lock().unwrap(),
        vec![("items/1".to_string(), 204), ("items".to_string(), 200)]
    );
}

/// Transport that calls back into its own context mid-submit.
#[derive(Default)]
struct ReentrantTransport {
    context: Mutex<Weak<ClientContext>>,
    inner_result: Mutex<Option<Result<()>>>,
}

#[async_trait]
impl Transport for ReentrantTransport {
    async fn submit(&self, batch: &[TransportRequest]) -> Result<Vec<TransportResponse>> {
        let context = self.context.lock().unwrap().upgrade();
        if let Some(context) = context {
            let result = context.execute_query().await;
            *self.inner_result.lock().unwrap() = Some(result);
        }
        Ok(batch.iter().map(|_| TransportResponse::no_content()).collect())
    }
}

#[tokio::test]
async fn test_reentrant_execute_is_rejected() {
    let transport = Arc::new(ReentrantTransport::default());
    let context = ClientContext::new(transport.clone());
    *transport.context.lock().unwrap() = Arc::downgrade(&context);
    context.add_query(Query::delete(ResourcePath::from("items/1")));

    context.execute_query().await.unwrap();

    let inner = transport.inner_result.lock().unwrap().take().unwrap();
    assert!(matches!(inner, Err(RestqError::InvalidState(_))));
    assert_eq!(context.pending_count(), 0);
    assert_eq!(context.status(), ExecutionStatus::Idle);
}

#[tokio::test]
async fn test_clear_drops_pending_work() {
    let (transport, context) = setup();
    let result = read_into(&context, "me");

    assert_eq!(context.clear().unwrap(), 1);
    context.execute_query().await.unwrap();

    assert_eq!(transport.call_count(), 0);
    assert_eq!(result.value(), Value::Null);
}
