//! Integration tests for the HTTP transport driving a client context
//!
//! A wiremock server stands in for the remote service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use restq_core::entities::{OnlineMeeting, UserProfile};
use restq_core::{ClientContext, RetryOptions};
use restq_domain::{ClientConfig, RestqError};
use restq_infra::{connect, AccessTokenProvider, StaticTokenProvider};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::new(format!("{}/v1.0", server.uri()))
}

fn connect_to(server: &MockServer) -> Arc<ClientContext> {
    let auth: Arc<dyn AccessTokenProvider> = Arc::new(StaticTokenProvider::new("secret-token"));
    connect(&config_for(server), Some(auth)).expect("client context")
}

#[tokio::test]
async fn test_get_sends_bearer_token_and_populates_entity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/profile"))
        .and(header("authorization", "Bearer secret-token"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AccountName": "i:0#.f|membership|jdoe@contoso.com",
            "DisplayName": "Jane Doe"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let context = connect_to(&server);
    let profile = context.resource::<UserProfile>("me/profile");
    profile.get().execute_query().await.unwrap();

    assert_eq!(profile.display_name().as_deref(), Some("Jane Doe"));
    assert_eq!(context.pending_count(), 0);
}

#[tokio::test]
async fn test_update_sends_patch_with_dirty_fields_only() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1.0/me/onlineMeetings/m-1"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"subject": "Weekly sync"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let context = connect(&config_for(&server), None).unwrap();
    let meeting = context.resource::<OnlineMeeting>("me/onlineMeetings/m-1");
    meeting.set_subject("Weekly sync").update().execute_query().await.unwrap();

    assert!(meeting.dirty_properties().is_empty());
}

#[tokio::test]
async fn test_service_operation_posts_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.0/me/profile/ShareAllSocialData"))
        .and(body_json(json!({"shareAll": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": null})))
        .expect(1)
        .mount(&server)
        .await;

    let context = connect(&config_for(&server), None).unwrap();
    let profile = context.resource::<UserProfile>("me/profile");
    profile.share_all_social_data(true);

    context.execute_query().await.unwrap();
}

#[tokio::test]
async fn test_not_found_fails_batch_with_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Resource not found"))
        .mount(&server)
        .await;

    let context = connect(&config_for(&server), None).unwrap();
    let profile = context.resource::<UserProfile>("me/profile");
    let err = profile.get().execute_query().await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("Resource not found"));
    assert_eq!(context.pending_count(), 1);
}

#[tokio::test]
async fn test_retry_resends_batch_after_server_error() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    Mock::given(method("GET"))
        .and(path("/v1.0/me/profile"))
        .respond_with(move |_req: &Request| -> ResponseTemplate {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"DisplayName": "Jane Doe"}))
            }
        })
        .expect(2)
        .mount(&server)
        .await;

    let context = connect(&config_for(&server), None).unwrap();
    let profile = context.resource::<UserProfile>("me/profile");
    profile.get();

    context
        .execute_query_retry(
            RetryOptions::new()
                .max_retry(2)
                .delay(Duration::ZERO)
                .retry_if(RestqError::is_retryable),
        )
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(profile.display_name().as_deref(), Some("Jane Doe"));
}

#[tokio::test]
async fn test_connect_rejects_invalid_config() {
    let config = ClientConfig::new("ftp://files.example.com");
    let err = connect(&config, None).unwrap_err();
    assert!(matches!(err, RestqError::Config(_)));
}
