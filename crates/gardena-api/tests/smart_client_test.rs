#![allow(clippy::unwrap_used)]
// Integration tests for `SmartClient` using wiremock.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gardena_api::{
    AccessToken, Credentials, Endpoints, Error, MowerControl, MowerControlCommand, SmartClient,
    TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, SmartClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let client = SmartClient::new(
        Endpoints {
            auth_host: base.clone(),
            smart_host: base,
        },
        Credentials {
            api_key: "key-123".to_string().into(),
            api_secret: "secret-456".to_string().into(),
        },
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

fn token() -> AccessToken {
    AccessToken::new("tok-abc".to_string().into(), Duration::from_secs(3600))
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_authenticate_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=key-123"))
        .and(body_string_contains("client_secret=secret-456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-abc",
            "expires_in": 86399,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = client.authenticate().await.unwrap();
    assert_eq!(token.lifetime(), Duration::from_secs(86399));
    assert!(!token.is_expired());
}

#[tokio::test]
async fn test_authenticate_failure() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid client"))
        .mount(&server)
        .await;

    let result = client.authenticate().await;

    assert!(
        matches!(result, Err(Error::Authentication { status: 401, ref body }) if body == "invalid client"),
        "expected Authentication error, got: {result:?}"
    );
}

// ── Location tests ──────────────────────────────────────────────────

#[tokio::test]
async fn test_list_locations_sends_auth_headers() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/locations"))
        .and(header("x-api-key", "key-123"))
        .and(header("authorization", "Bearer tok-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": "loc-1", "type": "LOCATION", "attributes": { "name": "Garden" } },
                { "id": "loc-2", "type": "LOCATION", "attributes": { "name": "Cabin" } }
            ]
        })))
        .mount(&server)
        .await;

    let locations = client.list_locations(&token()).await.unwrap();

    assert_eq!(locations.len(), 2);
    assert_eq!(locations[0].id, "loc-1");
    assert_eq!(locations[0].attributes.name.as_deref(), Some("Garden"));
}

#[tokio::test]
async fn test_list_locations_empty() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    let locations = client.list_locations(&token()).await.unwrap();
    assert!(locations.is_empty());
}

#[tokio::test]
async fn test_list_locations_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/locations"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let result = client.list_locations(&token()).await;
    assert!(matches!(result, Err(Error::Rejected { status: 403, .. })));
}

// ── WebSocket endpoint tests ────────────────────────────────────────

#[tokio::test]
async fn test_create_websocket() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/websocket"))
        .and(body_partial_json(json!({
            "data": { "type": "WEBSOCKET", "attributes": { "locationId": "loc-1" } }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {
                "id": "ws-1",
                "type": "WEBSOCKET",
                "attributes": { "validity": 10, "url": "wss://ws.example.test/abc" }
            }
        })))
        .mount(&server)
        .await;

    let url = client.create_websocket(&token(), "loc-1").await.unwrap();
    assert_eq!(url.as_str(), "wss://ws.example.test/abc");
}

#[tokio::test]
async fn test_create_websocket_requires_created_status() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/websocket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .mount(&server)
        .await;

    let result = client.create_websocket(&token(), "loc-1").await;
    assert!(matches!(result, Err(Error::Rejected { status: 200, .. })));
}

// ── Command tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_send_mower_command_accepted() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/v1/command/svc-42"))
        .and(header("content-type", "application/vnd.api+json"))
        .and(body_partial_json(json!({
            "data": {
                "type": "MOWER_CONTROL",
                "attributes": { "command": "START_SECONDS_TO_OVERRIDE", "seconds": 3600 }
            }
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let control = MowerControl {
        command: MowerControlCommand::StartSecondsToOverride,
        seconds: 3600,
    };
    client
        .send_mower_command(&token(), "svc-42", control)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_send_mower_command_other_success_is_failure() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/v1/command/svc-42"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok?"))
        .mount(&server)
        .await;

    let control = MowerControl {
        command: MowerControlCommand::ParkUntilNextTask,
        seconds: 0,
    };
    let result = client.send_mower_command(&token(), "svc-42", control).await;

    assert!(
        matches!(result, Err(Error::Rejected { operation: "mower command", status: 200, .. })),
        "expected Rejected, got: {result:?}"
    );
}
