//! Error mapping, config and client request tests.

use std::time::Duration;

use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::{FirestoreClient, FirestoreConfig};
use crate::error::FirestoreError;
use crate::retry::RetryConfig;
use crate::types::{ToFirestoreValue, Value};

fn clear_env() {
    for name in [
        "GCP_PROJECT_ID",
        "FIREBASE_PROJECT_ID",
        "FIRESTORE_DATABASE_ID",
        "FIRESTORE_CONNECT_TIMEOUT_SECS",
        "FIRESTORE_RETRY_BASE_MS",
        "FIRESTORE_RETRY_MAX_MS",
        "FIRESTORE_EMULATOR_HOST",
    ] {
        std::env::remove_var(name);
    }
}

async fn emulator_client(server: &MockServer, max_retries: u32) -> FirestoreClient {
    FirestoreClient::new(FirestoreConfig {
        emulator_host: Some(server.address().to_string()),
        retry: RetryConfig {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
        ..FirestoreConfig::new("test-project")
    })
    .await
    .unwrap()
}

#[test]
fn test_error_from_http_status() {
    assert!(matches!(FirestoreError::from_http_status(429, "slow down"), FirestoreError::RateLimited(_)));
    assert!(matches!(FirestoreError::from_http_status(503, "unavailable"), FirestoreError::ServerError(503, _)));
    assert!(matches!(FirestoreError::from_http_status(400, "bad"), FirestoreError::RequestFailed(_)));
    assert!(matches!(FirestoreError::from_http_status(404, "missing"), FirestoreError::NotFound(_)));
    assert!(matches!(FirestoreError::from_http_status(409, "exists"), FirestoreError::AlreadyExists(_)));
    assert!(matches!(FirestoreError::from_http_status(403, "nope"), FirestoreError::PermissionDenied(_)));
}

#[test]
fn test_error_retry_classification() {
    assert!(FirestoreError::from_http_status(500, "error").is_retryable());
    assert!(FirestoreError::from_http_status(429, "slow down").is_retryable());
    assert!(!FirestoreError::from_http_status(400, "bad").is_retryable());
    assert!(!FirestoreError::from_http_status(404, "missing").is_retryable());

    assert_eq!(FirestoreError::RateLimited(2000).retry_after_ms(), Some(2000));
    assert_eq!(FirestoreError::ServerError(500, "error".into()).retry_after_ms(), None);
    assert_eq!(FirestoreError::RateLimited(10).http_status(), Some(429));
    assert_eq!(FirestoreError::ServerError(502, "bad gateway".into()).http_status(), Some(502));
    assert_eq!(FirestoreError::request_failed("x").http_status(), None);
}

#[test]
#[serial]
fn test_config_requires_project_id() {
    clear_env();
    assert!(FirestoreConfig::from_env().is_err());

    std::env::set_var("GCP_PROJECT_ID", "");
    assert!(FirestoreConfig::from_env().is_err());
    clear_env();
}

#[test]
#[serial]
fn test_config_prefers_gcp_project_id() {
    clear_env();
    std::env::set_var("FIREBASE_PROJECT_ID", "firebase-project");
    assert_eq!(FirestoreConfig::from_env().unwrap().project_id, "firebase-project");

    std::env::set_var("GCP_PROJECT_ID", "gcp-project");
    assert_eq!(FirestoreConfig::from_env().unwrap().project_id, "gcp-project");
    clear_env();
}

#[test]
#[serial]
fn test_config_env_overrides() {
    clear_env();
    std::env::set_var("GCP_PROJECT_ID", "test");
    std::env::set_var("FIRESTORE_CONNECT_TIMEOUT_SECS", "not-a-number");
    std::env::set_var("FIRESTORE_RETRY_BASE_MS", "50");
    std::env::set_var("FIRESTORE_RETRY_MAX_MS", "2000");
    std::env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8080");

    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    assert_eq!(config.database_id, "(default)");
    assert_eq!(config.retry.base_delay_ms, 50);
    assert_eq!(config.retry.max_delay_ms, 2000);
    assert_eq!(config.emulator_host.as_deref(), Some("localhost:8080"));
    clear_env();
}

#[tokio::test]
async fn test_get_document_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"/v1/projects/test-project/databases/.+/documents/runs/abc$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/databases/(default)/documents/runs/abc",
            "fields": {"status": {"stringValue": "processing"}}
        })))
        .mount(&server)
        .await;

    let client = emulator_client(&server, 2).await;
    let doc = client.get_document("runs", "abc").await.unwrap().unwrap();
    assert_eq!(doc.get::<String>("status").as_deref(), Some("processing"));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_upsert_document_surfaces_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(400).set_body_string("INVALID_ARGUMENT"))
        .expect(1)
        .mount(&server)
        .await;

    let client = emulator_client(&server, 3).await;
    let mut fields = std::collections::HashMap::new();
    fields.insert("status".to_string(), "failed".to_firestore_value());
    fields.insert("error_message".to_string(), Value::NullValue(()));

    let err = client
        .upsert_document("runs", "abc", fields, Some(&["status"][..]))
        .await
        .unwrap_err();
    assert!(matches!(err, FirestoreError::RequestFailed(msg) if msg.contains("INVALID_ARGUMENT")));
}
