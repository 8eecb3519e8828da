//! Tests for the HTTP provider client.

use super::*;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transfer_id(s: &str) -> ResourceId {
    ResourceId::new(s).unwrap()
}

async fn client_for(server: &MockServer) -> HttpProviderClient {
    HttpProviderClient::new(server.uri(), "test-token", Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_fetch_transfer_parses_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transfers/t-1"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "t-1",
            "status": "processed",
            "amount": {"value": "42.50", "currency": "USD"},
            "created": "2026-03-01T12:00:00+00:00"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let record = client
        .fetch_transfer(&transfer_id("t-1"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.id.as_str(), "t-1");
    assert_eq!(record.status, "processed");
    assert_eq!(record.amount, "42.50");
    assert_eq!(record.currency, "USD");
}

#[tokio::test]
async fn test_not_found_is_none_not_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transfers/t-missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let record = client.fetch_transfer(&transfer_id("t-missing")).await.unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn test_rate_limit_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transfers/t-1"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.fetch_transfer(&transfer_id("t-1")).await.unwrap_err();
    assert!(matches!(err, ProviderError::RateLimited));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transfers/t-1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.fetch_transfer(&transfer_id("t-1")).await.unwrap_err();
    assert!(matches!(err, ProviderError::RequestFailed { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_client_error_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transfers/t-1"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.fetch_transfer(&transfer_id("t-1")).await.unwrap_err();
    assert!(matches!(err, ProviderError::Rejected { status: 403, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_a_request_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transfers/t-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.fetch_transfer(&transfer_id("t-1")).await.unwrap_err();
    assert!(matches!(err, ProviderError::RequestFailed { .. }));
}
