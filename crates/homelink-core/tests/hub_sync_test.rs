// End-to-end tests for `HubClient` against a scripted in-process hub.
#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use homelink_core::{
    CloseReason, CommandValue, CoreError, EntityId, HubClient, HubConfig, SessionState,
    StateObserver, StateUpdate,
};

const ACCESS_TOKEN: &str = "llat-test-token";

// ── Scripted hub helpers ────────────────────────────────────────────

type HubWs = WebSocketStream<TcpStream>;

async fn bind_hub() -> (TcpListener, HubConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = HubConfig {
        base_url: format!("http://127.0.0.1:{port}").parse().unwrap(),
        access_token: SecretString::from(ACCESS_TOKEN),
        reconnect_delay: Duration::from_millis(20),
        max_reconnect_attempts: 3,
    };
    (listener, config)
}

async fn accept_ws(listener: &TcpListener) -> HubWs {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

async fn recv_json(ws: &mut HubWs) -> Value {
    loop {
        match ws.next().await.expect("client hung up").unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(payload) => ws.send(Message::Pong(payload)).await.unwrap(),
            other => panic!("unexpected message from client: {other:?}"),
        }
    }
}

async fn send_json(ws: &mut HubWs, value: &Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Run the auth + subscribe + snapshot exchange, returning the
/// snapshot request id.
async fn run_handshake(ws: &mut HubWs, snapshot: Value) -> u64 {
    send_json(ws, &json!({ "type": "auth_required" })).await;

    let auth = recv_json(ws).await;
    assert_eq!(auth["type"], "auth");
    assert_eq!(auth["access_token"], ACCESS_TOKEN);
    send_json(ws, &json!({ "type": "auth_ok" })).await;

    let subscribe = recv_json(ws).await;
    assert_eq!(subscribe["type"], "subscribe_events");
    assert_eq!(subscribe["event_type"], "state_changed");
    send_json(
        ws,
        &json!({ "id": subscribe["id"], "type": "result", "success": true, "result": null }),
    )
    .await;

    let get_states = recv_json(ws).await;
    assert_eq!(get_states["type"], "get_states");
    let snapshot_id = get_states["id"].as_u64().unwrap();
    send_json(
        ws,
        &json!({ "id": snapshot_id, "type": "result", "success": true, "result": snapshot }),
    )
    .await;
    snapshot_id
}

fn state_changed(entity_id: &str, state: Value) -> Value {
    json!({
        "type": "event",
        "event": {
            "event_type": "state_changed",
            "data": { "entity_id": entity_id, "new_state": state }
        }
    })
}

async fn wait_for_closed(client: &HubClient) -> CloseReason {
    let mut rx = client.session_state();
    loop {
        if let SessionState::Closed { reason } = *rx.borrow_and_update() {
            return reason;
        }
        rx.changed().await.unwrap();
    }
}

// ── Observer helper ─────────────────────────────────────────────────

struct Recorder {
    seen: Mutex<Vec<(EntityId, StateUpdate)>>,
}

impl Recorder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
        })
    }

    fn updates(&self) -> Vec<(EntityId, StateUpdate)> {
        self.seen.lock().unwrap().clone()
    }
}

impl StateObserver for Recorder {
    fn apply(&self, id: &EntityId, update: &StateUpdate) {
        self.seen.lock().unwrap().push((id.clone(), *update));
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn full_sync_flow() {
    let (listener, config) = bind_hub().await;

    let hub = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        run_handshake(
            &mut ws,
            json!([
                { "entity_id": "light.kitchen", "state": "on",
                  "attributes": { "brightness": 128 } },
                { "entity_id": "climate.living_room", "state": "heat" }
            ]),
        )
        .await;

        send_json(&mut ws, &state_changed("switch.fan", json!({ "state": "on" }))).await;

        // The client should translate the queued command into a
        // call_service request.
        let command = recv_json(&mut ws).await;
        assert_eq!(command["type"], "call_service");
        assert_eq!(command["domain"], "light");
        assert_eq!(command["service"], "turn_off");
        assert_eq!(command["service_data"], json!({ "entity_id": "light.kitchen" }));
    });

    let client = HubClient::new(config);
    let kitchen = Recorder::new();
    client.register(EntityId::from("light.kitchen"), kitchen.clone());
    let mut updates = client.updates();

    client.connect().unwrap();
    timeout(Duration::from_secs(5), client.wait_until_ready())
        .await
        .unwrap()
        .unwrap();

    // Snapshot landed in the cache and reached the observer.
    let cached = client.lookup(&EntityId::from("light.kitchen")).unwrap();
    assert_eq!(cached.state, "on");
    assert_eq!(
        client.lookup(&EntityId::from("climate.living_room")).unwrap().state,
        "heat"
    );
    let seen = kitchen.updates();
    assert_eq!(seen.len(), 1);
    let StateUpdate::Power { on, intensity } = seen[0].1 else {
        panic!("expected Power update");
    };
    assert!(on);
    assert!((intensity - 128.0 / 255.0).abs() < 1e-6);

    // Live event flows through the broadcast stream.
    let fan = timeout(Duration::from_secs(5), async {
        loop {
            let change = updates.recv().await.unwrap();
            if change.entity_id == EntityId::from("switch.fan") {
                return change;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(fan.state.state, "on");
    assert!(client.data_age().is_some());

    client
        .request_command(EntityId::from("light.kitchen"), CommandValue::Switch(false))
        .unwrap();

    timeout(Duration::from_secs(5), hub).await.unwrap().unwrap();
    client.shutdown();
}

#[tokio::test]
async fn auth_rejection_is_terminal() {
    let (listener, config) = bind_hub().await;

    let hub = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        send_json(&mut ws, &json!({ "type": "auth_required" })).await;
        let auth = recv_json(&mut ws).await;
        assert_eq!(auth["type"], "auth");
        send_json(
            &mut ws,
            &json!({ "type": "auth_invalid", "message": "Invalid access token" }),
        )
        .await;
    });

    let client = HubClient::new(config);
    client.connect().unwrap();

    let err = timeout(Duration::from_secs(5), client.wait_until_ready())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    assert_eq!(
        timeout(Duration::from_secs(5), wait_for_closed(&client))
            .await
            .unwrap(),
        CloseReason::AuthRejected
    );
    timeout(Duration::from_secs(5), hub).await.unwrap().unwrap();
}

#[tokio::test]
async fn reconnect_ceiling_closes_the_client() {
    // Grab a free port, then close it so every dial is refused.
    let (listener, config) = bind_hub().await;
    drop(listener);

    let client = HubClient::new(config);
    client.connect().unwrap();

    assert_eq!(
        timeout(Duration::from_secs(5), wait_for_closed(&client))
            .await
            .unwrap(),
        CloseReason::ReconnectExhausted
    );
    assert!(client.session_state().borrow().is_terminal());
    let err = client.wait_until_ready().await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::ReconnectExhausted { attempts: 3 }
    ));
}

#[tokio::test]
async fn dropped_connection_resyncs_after_fixed_delay() {
    let (listener, config) = bind_hub().await;

    let hub = tokio::spawn(async move {
        // First connection: handshake, then drop without a close frame.
        let mut ws = accept_ws(&listener).await;
        run_handshake(
            &mut ws,
            json!([{ "entity_id": "light.kitchen", "state": "on" }]),
        )
        .await;
        drop(ws);

        // The client comes back and resyncs from scratch.
        let mut ws = accept_ws(&listener).await;
        run_handshake(
            &mut ws,
            json!([{ "entity_id": "light.kitchen", "state": "off" }]),
        )
        .await;
        ws
    });

    let client = HubClient::new(config);
    let mut updates = client.updates();
    client.connect().unwrap();

    timeout(Duration::from_secs(5), client.wait_until_ready())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(client.lookup(&EntityId::from("light.kitchen")).unwrap().state, "on");

    // Second snapshot supersedes the first in the cache.
    timeout(Duration::from_secs(5), async {
        loop {
            let change = updates.recv().await.unwrap();
            if change.state.state == "off" {
                return;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(client.lookup(&EntityId::from("light.kitchen")).unwrap().state, "off");

    let _ws = timeout(Duration::from_secs(5), hub).await.unwrap().unwrap();
    client.shutdown();
}

#[tokio::test]
async fn commands_fail_fast_when_not_ready() {
    let (listener, config) = bind_hub().await;
    drop(listener);

    let client = HubClient::new(config);
    let err = client
        .request_command(EntityId::from("light.kitchen"), CommandValue::Switch(true))
        .unwrap_err();
    assert!(matches!(err, CoreError::HubDisconnected));
}
