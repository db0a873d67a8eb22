#![allow(clippy::unwrap_used)]
// Lifecycle tests for the `Bridge` facade: start, observe, shut down.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gardena_api::{Credentials, Endpoints};
use gardena_core::{
    Bridge, BridgeConfig, BusState, CoreError, ReconnectPolicy, SessionConfig, SessionPhase,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// A local port with nothing listening on it.
async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn config(server: &MockServer) -> BridgeConfig {
    let base = Url::parse(&server.uri()).unwrap();
    let mut config = BridgeConfig::new(Credentials {
        api_key: "key".to_string().into(),
        api_secret: "secret".to_string().into(),
    });
    config.endpoints = Endpoints {
        auth_host: base.clone(),
        smart_host: base,
    };
    config.session = SessionConfig {
        restart_pause: Duration::from_millis(50),
        ..SessionConfig::default()
    };
    config.bus.host = "127.0.0.1".into();
    config.bus.port = closed_port().await;
    config.bus.reconnect = ReconnectPolicy {
        initial_delay: Duration::from_millis(10),
        rate: 2,
        max_delay: Duration::from_millis(40),
        max_attempts: 3,
    };
    config
}

async fn mount_unprovisioned_account(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "expires_in": 86_399
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(server)
        .await;
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_unreachable_broker_degrades_without_stopping_sessions() {
    let server = MockServer::start().await;
    mount_unprovisioned_account(&server).await;

    let bridge = Bridge::new(config(&server).await).unwrap();
    let mut bus_state = bridge.bus_state();
    let mut phase = bridge.session_phase();
    bridge.start().await.unwrap();

    tokio::time::timeout(
        Duration::from_secs(5),
        bus_state.wait_for(|s| *s == BusState::Degraded),
    )
    .await
    .unwrap()
    .unwrap();

    // the stream side keeps cycling regardless of the bus
    tokio::time::timeout(
        Duration::from_secs(5),
        phase.wait_for(|p| *p == SessionPhase::Failed),
    )
    .await
    .unwrap()
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), bridge.shutdown())
        .await
        .unwrap();

    assert_eq!(*bridge.bus_state().borrow(), BusState::Stopped);
    assert_eq!(*bridge.session_phase().borrow(), SessionPhase::Closed);
    assert!(bridge.session().current().token.is_none());
}

#[tokio::test]
async fn test_bridge_starts_only_once() {
    let server = MockServer::start().await;
    mount_unprovisioned_account(&server).await;

    let bridge = Bridge::new(config(&server).await).unwrap();
    bridge.start().await.unwrap();

    let second = bridge.start().await;
    assert!(matches!(second, Err(CoreError::Internal(_))));

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_cancel_token_stops_tasks() {
    let server = MockServer::start().await;
    mount_unprovisioned_account(&server).await;

    let bridge = Bridge::new(config(&server).await).unwrap();
    bridge.start().await.unwrap();

    bridge.cancel_token().cancel();
    let mut phase = bridge.session_phase();
    tokio::time::timeout(
        Duration::from_secs(5),
        phase.wait_for(|p| *p == SessionPhase::Closed),
    )
    .await
    .unwrap()
    .unwrap();

    bridge.shutdown().await;
    assert_eq!(*bridge.bus_state().borrow(), BusState::Stopped);
}
