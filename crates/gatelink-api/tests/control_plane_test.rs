#![allow(clippy::unwrap_used)]
// Integration tests for `ControlPlaneClient` using wiremock.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gatelink_api::{ControlPlaneClient, Error};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ControlPlaneClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = ControlPlaneClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn token() -> SecretString {
    SecretString::from("device-token-123".to_string())
}

// ── Pair exchange ───────────────────────────────────────────────────

#[tokio::test]
async fn test_pair_success() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/device/pair/1234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": "fresh-token" })))
        .mount(&server)
        .await;

    let token = client.pair(1234).await.unwrap();
    assert_eq!(token.expose_secret(), "fresh-token");
}

#[tokio::test]
async fn test_pair_non_success_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/device/pair/9999"))
        .respond_with(ResponseTemplate::new(404).set_body_string("unknown pair code"))
        .mount(&server)
        .await;

    let result = client.pair(9999).await;
    assert!(
        matches!(result, Err(Error::Api { status: 404, .. })),
        "expected Api error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_pair_empty_token_is_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/device/pair/1234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": "" })))
        .mount(&server)
        .await;

    let result = client.pair(1234).await;
    assert!(
        matches!(result, Err(Error::MalformedResponse { .. })),
        "expected MalformedResponse, got: {result:?}"
    );
}

// ── Token validation / device info ──────────────────────────────────

#[tokio::test]
async fn test_device_self_success() {
    let (server, client) = setup().await;

    let body = json!({
        "data": {
            "id": "dev-001",
            "name": "living-room",
            "shockers": [
                { "id": "ep-1", "rfId": 4321, "model": 1 },
                { "id": "ep-2", "rfId": 8765, "model": 2 }
            ]
        }
    });

    Mock::given(method("GET"))
        .and(path("/device/self"))
        .and(header("DeviceToken", "device-token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let info = client.device_self(&token()).await.unwrap();
    assert_eq!(info.id, "dev-001");
    assert_eq!(info.name, "living-room");
    assert_eq!(info.endpoints.len(), 2);
    assert_eq!(info.endpoints[0].rf_id, 4321);
    assert_eq!(info.endpoints[1].model, 2);
}

#[tokio::test]
async fn test_device_self_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/device/self"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.device_self(&token()).await;
    assert!(
        matches!(result, Err(Error::Unauthorized)),
        "expected Unauthorized, got: {result:?}"
    );
}

#[tokio::test]
async fn test_device_self_without_endpoints() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/device/self"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "id": "dev-002", "name": "bare" } })),
        )
        .mount(&server)
        .await;

    let info = client.device_self(&token()).await.unwrap();
    assert!(info.endpoints.is_empty());
}

// ── Gateway assignment ──────────────────────────────────────────────

#[tokio::test]
async fn test_assign_gateway_success() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/device/assignGateway"))
        .and(header("DeviceToken", "device-token-123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "fqdn": "eu1.gateway.example.com", "country": "DE" } })),
        )
        .mount(&server)
        .await;

    let assignment = client.assign_gateway(&token()).await.unwrap();
    assert_eq!(assignment.fqdn, "eu1.gateway.example.com");
    assert_eq!(assignment.country, "DE");
}

#[tokio::test]
async fn test_assign_gateway_missing_field_is_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/device/assignGateway"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "fqdn": "eu1.gateway.example.com" } })),
        )
        .mount(&server)
        .await;

    let result = client.assign_gateway(&token()).await;
    assert!(
        matches!(result, Err(Error::MalformedResponse { .. })),
        "expected MalformedResponse, got: {result:?}"
    );
}

#[tokio::test]
async fn test_assign_gateway_backend_failure() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/device/assignGateway"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;

    let result = client.assign_gateway(&token()).await;
    match result {
        Err(e @ Error::Api { status: 503, .. }) => assert!(e.is_transient()),
        other => panic!("expected Api error, got: {other:?}"),
    }
}
