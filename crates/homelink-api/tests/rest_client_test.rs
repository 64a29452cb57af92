// Integration tests for `RestClient` using wiremock.

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homelink_api::{EntityId, Error, RestClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let client = RestClient::new(base, SecretString::from("test-token".to_owned())).unwrap();
    (server, client)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn get_state_sends_bearer_token_and_decodes() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/states/light.kitchen"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entity_id": "light.kitchen",
            "state": "on",
            "attributes": { "brightness": 200 }
        })))
        .mount(&server)
        .await;

    let state = client
        .get_state(&EntityId::from("light.kitchen"))
        .await
        .unwrap();

    assert_eq!(state.state, "on");
    assert_eq!(state.brightness(), Some(200.0));
}

#[tokio::test]
async fn get_state_rejects_payload_without_state() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/states/light.kitchen"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entity_id": "light.kitchen"
        })))
        .mount(&server)
        .await;

    let err = client
        .get_state(&EntityId::from("light.kitchen"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }), "got {err:?}");
}

#[tokio::test]
async fn call_service_posts_service_data() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/services/light/turn_on"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({ "entity_id": "light.kitchen" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    client
        .call_service("light", "turn_on", &json!({ "entity_id": "light.kitchen" }))
        .await
        .unwrap();
}

#[tokio::test]
async fn unauthorized_maps_to_auth_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/services/switch/turn_off"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client
        .call_service("switch", "turn_off", &json!({ "entity_id": "switch.fan" }))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthRejected { .. }), "got {err:?}");
}

#[tokio::test]
async fn server_error_surfaces_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/states/climate.ac"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client.get_state(&EntityId::from("climate.ac")).await.unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}
