// ── Wire protocol codec ──
//
// Serializes outgoing hub requests and classifies inbound frames into
// typed envelopes. Decoding is defensive throughout: an empty or
// non-parseable frame yields `ServerFrame::Unrecognized` and a debug
// log, never an error -- the processing loop always continues with the
// next frame.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;

/// The one event class this engine subscribes to.
pub const STATE_CHANGED: &str = "state_changed";

// ── Outbound requests ───────────────────────────────────────────────

/// An outgoing request frame for the hub's WebSocket API.
///
/// Correlation ids are assigned by the caller (the connection session
/// owns the monotonic counter); the codec only fixes the wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Auth {
        access_token: String,
    },
    SubscribeEvents {
        id: u64,
        event_type: String,
    },
    GetStates {
        id: u64,
    },
    CallService {
        id: u64,
        domain: String,
        service: String,
        service_data: Value,
    },
}

impl ClientRequest {
    pub fn subscribe_events(id: u64) -> Self {
        Self::SubscribeEvents {
            id,
            event_type: STATE_CHANGED.to_owned(),
        }
    }

    pub fn get_states(id: u64) -> Self {
        Self::GetStates { id }
    }

    /// Serialize to the exact JSON text sent on the wire.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("request serialization cannot fail")
    }
}

// ── Inbound frames ──────────────────────────────────────────────────

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// Handshake preamble some hubs send before any auth exchange.
    AuthRequired,
    AuthOk,
    AuthInvalid {
        message: String,
    },
    Event(EventEnvelope),
    /// Response to a correlated request. A null/absent `result` is a
    /// valid non-error outcome, distinct from a parse failure.
    CommandResult {
        id: u64,
        success: bool,
        result: Option<Value>,
    },
    /// Anything else: empty, garbage, or an unknown shape. Logged and
    /// dropped by the caller.
    Unrecognized,
}

/// An `event`-typed frame, unwrapped one level.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub event_type: String,
    pub data: Value,
}

/// Classify one inbound text frame.
pub fn decode_frame(text: &str) -> ServerFrame {
    if text.trim().is_empty() {
        debug!("dropping empty frame");
        return ServerFrame::Unrecognized;
    }

    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "dropping non-parseable frame");
            return ServerFrame::Unrecognized;
        }
    };

    match value.get("type").and_then(Value::as_str) {
        Some("auth_required") => ServerFrame::AuthRequired,
        Some("auth_ok") => ServerFrame::AuthOk,
        Some("auth_invalid") => ServerFrame::AuthInvalid {
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("invalid access token")
                .to_owned(),
        },
        Some("event") => decode_event(&value),
        // Result frames carry `type: "result"`; older hubs omit the tag
        // and are recognized by their correlation id alone.
        Some("result") | None => decode_result(&value),
        Some(other) => {
            debug!(frame_type = other, "dropping frame of unknown type");
            ServerFrame::Unrecognized
        }
    }
}

fn decode_event(value: &Value) -> ServerFrame {
    let Some(event) = value.get("event") else {
        debug!("dropping event frame without event payload");
        return ServerFrame::Unrecognized;
    };
    let Some(event_type) = event.get("event_type").and_then(Value::as_str) else {
        debug!("dropping event frame without event_type");
        return ServerFrame::Unrecognized;
    };

    ServerFrame::Event(EventEnvelope {
        event_type: event_type.to_owned(),
        data: event.get("data").cloned().unwrap_or(Value::Null),
    })
}

fn decode_result(value: &Value) -> ServerFrame {
    let Some(id) = value.get("id").and_then(Value::as_u64) else {
        debug!("dropping result frame without correlation id");
        return ServerFrame::Unrecognized;
    };

    ServerFrame::CommandResult {
        id,
        success: value.get("success").and_then(Value::as_bool).unwrap_or(true),
        result: value.get("result").cloned().filter(|r| !r.is_null()),
    }
}

// ── Endpoint derivation ─────────────────────────────────────────────

/// Derive the WebSocket endpoint from the hub's base HTTP(S) URL:
/// same host, scheme mapped http→ws / https→wss, path `/api/websocket`.
pub fn websocket_endpoint(base: &Url) -> Result<Url, Error> {
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(Error::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    };

    let mut ws_url = base.clone();
    ws_url
        .set_scheme(scheme)
        .map_err(|()| Error::UnsupportedScheme {
            scheme: base.scheme().to_owned(),
        })?;

    let path = format!("{}/api/websocket", base.path().trim_end_matches('/'));
    ws_url.set_path(&path);
    Ok(ws_url)
}

// ── Tests ───────────────────────────────────────────────────────────
