#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gatelink_core::{
    CaptivePortal, CommandSink, CoreError, InboundCommand, LinkEvent, ManagerConfig,
    MemoryTokenStore, SessionManager, TlsMode, TokenStore,
};

struct NullSink;

impl CommandSink for NullSink {
    fn handle(&self, _command: &InboundCommand) -> bool {
        true
    }
}

struct NullPortal;

impl CaptivePortal for NullPortal {
    fn set_always_enabled(&self, _enabled: bool) {}
}

struct TestHarness {
    server: MockServer,
    manager: SessionManager,
    store: Arc<MemoryTokenStore>,
}

async fn setup() -> TestHarness {
    setup_with_cooldown(Duration::from_millis(20_000)).await
}

async fn setup_with_cooldown(cooldown: Duration) -> TestHarness {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());

    let mut config = ManagerConfig::new(Url::parse(&server.uri()).unwrap(), "1.0.0-test");
    config.tls = TlsMode::System;
    config.timeout = Duration::from_secs(5);
    config.discovery_cooldown = cooldown;

    let manager = SessionManager::new(
        config,
        Arc::clone(&store) as Arc<dyn TokenStore>,
        Arc::new(NullSink),
        Arc::new(NullPortal),
    )
    .unwrap();

    TestHarness {
        server,
        manager,
        store,
    }
}

fn seed_token(store: &MemoryTokenStore) {
    store
        .set(SecretString::from("stored-token".to_string()))
        .unwrap();
}

#[tokio::test]
async fn pair_persists_the_token_and_marks_paired() {
    let mut h = setup().await;

    Mock::given(method("GET"))
        .and(path("/device/pair/123456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": "fresh-token" })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.manager.handle_link_event(LinkEvent::Up);
    h.manager.pair(123_456).await.unwrap();

    assert!(h.manager.is_paired());
    assert!(h.store.has());
}

#[tokio::test]
async fn failed_pair_leaves_stored_state_untouched() {
    let mut h = setup().await;

    Mock::given(method("GET"))
        .and(path("/device/pair/999999"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "unknown code" })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.manager.handle_link_event(LinkEvent::Up);
    let result = h.manager.pair(999_999).await;

    assert!(result.is_err());
    assert!(!h.manager.is_paired());
    assert!(!h.store.has());
}

#[tokio::test]
async fn pair_without_link_never_touches_the_network() {
    let mut h = setup().await;
    // No mocks mounted: any request would 404 and the expect(0) below
    // would fail verification on drop.
    Mock::given(method("GET"))
        .and(path("/device/pair/123456"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let result = h.manager.pair(123_456).await;
    assert!(matches!(result, Err(CoreError::LinkDown)));
}

#[tokio::test]
async fn first_update_validates_the_token_and_attempts_discovery() {
    let mut h = setup().await;
    seed_token(&h.store);

    Mock::given(method("GET"))
        .and(path("/device/self"))
        .and(header_exists("DeviceToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "dev-1",
                "name": "garage",
                "shockers": [ { "id": "ep-1", "rfId": 4919, "model": 1 } ]
            }
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    // Discovery fails; the session stays idle but the attempt must happen
    // in the same tick as the bootstrap.
    Mock::given(method("GET"))
        .and(path("/device/assignGateway"))
        .and(header_exists("DeviceToken"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&h.server)
        .await;

    h.manager.handle_link_event(LinkEvent::Up);
    h.manager.update().await;

    assert!(h.manager.is_paired());
    assert!(!h.manager.is_connected());
}

#[tokio::test]
async fn rejected_token_is_cleared_exactly_once() {
    let mut h = setup().await;
    seed_token(&h.store);

    Mock::given(method("GET"))
        .and(path("/device/self"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;

    h.manager.handle_link_event(LinkEvent::Up);
    h.manager.update().await;

    assert!(!h.manager.is_paired());
    assert!(!h.store.has(), "rejected token must be purged");

    // With no token left, further ticks stay off the network; the
    // expect(1) above is verified when the server drops.
    h.manager.update().await;
    h.manager.update().await;
}

#[tokio::test]
async fn transient_validation_failure_is_retried_next_tick() {
    let mut h = setup().await;
    seed_token(&h.store);

    Mock::given(method("GET"))
        .and(path("/device/self"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&h.server)
        .await;

    h.manager.handle_link_event(LinkEvent::Up);
    h.manager.update().await;
    assert!(!h.manager.is_paired());
    assert!(h.store.has(), "a backend error must not cost us the token");

    h.manager.update().await;
}

#[tokio::test]
async fn discovery_attempts_respect_the_cooldown() {
    let mut h = setup().await;
    seed_token(&h.store);

    Mock::given(method("GET"))
        .and(path("/device/self"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "dev-1", "name": "garage" }
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/device/assignGateway"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&h.server)
        .await;

    h.manager.handle_link_event(LinkEvent::Up);
    h.manager.update().await;
    // Well inside the 20 s window: the failed attempt above consumed it.
    h.manager.update().await;
    h.manager.update().await;
}

#[tokio::test]
async fn discovery_retries_once_the_cooldown_elapses() {
    let mut h = setup_with_cooldown(Duration::ZERO).await;
    seed_token(&h.store);

    Mock::given(method("GET"))
        .and(path("/device/self"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "dev-1", "name": "garage" }
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/device/assignGateway"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&h.server)
        .await;

    h.manager.handle_link_event(LinkEvent::Up);
    h.manager.update().await;
    h.manager.update().await;
}

#[tokio::test]
async fn link_loss_halts_all_network_activity() {
    let mut h = setup().await;
    seed_token(&h.store);

    Mock::given(method("GET"))
        .and(path("/device/self"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "dev-1", "name": "garage" }
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/device/assignGateway"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&h.server)
        .await;

    h.manager.handle_link_event(LinkEvent::Up);
    h.manager.update().await;
    assert!(h.manager.is_paired());

    h.manager.handle_link_event(LinkEvent::Down);
    assert!(!h.manager.is_paired());

    // Token is still stored, but without a link nothing is attempted.
    assert!(h.store.has());
    h.manager.update().await;
    h.manager.update().await;
}

#[tokio::test]
async fn unpair_forgets_the_token() {
    let mut h = setup().await;

    Mock::given(method("GET"))
        .and(path("/device/pair/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": "t" })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.manager.handle_link_event(LinkEvent::Up);
    h.manager.pair(42).await.unwrap();
    assert!(h.store.has());

    h.manager.unpair().unwrap();
    assert!(!h.manager.is_paired());
    assert!(!h.store.has());
}
