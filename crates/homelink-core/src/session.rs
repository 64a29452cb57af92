// ── Per-connection session state machine ──
//
// Pure logic for one WebSocket connection: hand it inbound frames, it
// hands back outbound requests. Owning no I/O keeps the handshake and
// snapshot sequencing unit-testable without a socket.

use homelink_api::{
    parse_snapshot_entry, ClientRequest, Domain, EntityId, ServerFrame, STATE_CHANGED,
};
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::CoreError;

/// Where this connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Auth frame sent, waiting for the verdict.
    Authenticating,
    /// Authenticated; subscription and snapshot requests in flight.
    Subscribing,
    /// Snapshot absorbed, live events flowing.
    Ready,
}

/// What the session loop should do after a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Continue,
    /// Credential rejection. Terminal for the whole client, not just
    /// this connection.
    AuthRejected { message: String },
}

/// A device-level command, expressed independently of the wire shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandValue {
    Switch(bool),
    Number(f64),
}

pub struct Session {
    next_id: u64,
    phase: SessionPhase,
    snapshot_id: Option<u64>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            phase: SessionPhase::Authenticating,
            snapshot_id: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Process one classified frame, appending any requests it calls
    /// for to `out`.
    pub fn handle_frame(
        &mut self,
        frame: ServerFrame,
        dispatcher: &Dispatcher,
        out: &mut Vec<ClientRequest>,
    ) -> FrameOutcome {
        match frame {
            // The preamble needs no reply; the auth frame is already on
            // the wire. Unrecognized frames were logged at decode time.
            ServerFrame::AuthRequired | ServerFrame::Unrecognized => FrameOutcome::Continue,

            ServerFrame::AuthOk => {
                info!("hub accepted credentials");
                self.phase = SessionPhase::Subscribing;
                out.push(ClientRequest::subscribe_events(self.next_id()));
                let snapshot_id = self.next_id();
                self.snapshot_id = Some(snapshot_id);
                out.push(ClientRequest::get_states(snapshot_id));
                FrameOutcome::Continue
            }

            ServerFrame::AuthInvalid { message } => FrameOutcome::AuthRejected { message },

            ServerFrame::Event(envelope) => {
                if envelope.event_type != STATE_CHANGED {
                    debug!(event_type = %envelope.event_type, "ignoring unsubscribed event type");
                    return FrameOutcome::Continue;
                }
                match parse_snapshot_entry_from_event(&envelope.data) {
                    Some((id, state)) => dispatcher.dispatch(id, state),
                    None => debug!("dropping state_changed event with unusable payload"),
                }
                FrameOutcome::Continue
            }

            ServerFrame::CommandResult { id, success, result } => {
                if Some(id) == self.snapshot_id {
                    self.ingest_snapshot(result.as_ref(), dispatcher);
                    self.phase = SessionPhase::Ready;
                } else if success {
                    debug!(id, "acknowledgement for a fire-and-forget request");
                } else {
                    warn!(id, "hub reported a failed request");
                }
                FrameOutcome::Continue
            }
        }
    }

    /// Absorb the bulk snapshot. Rows that fail to parse are skipped
    /// individually; a missing or non-array result yields an empty
    /// snapshot, which is still a completed handshake.
    fn ingest_snapshot(&mut self, result: Option<&serde_json::Value>, dispatcher: &Dispatcher) {
        let Some(rows) = result.and_then(serde_json::Value::as_array) else {
            warn!("snapshot result was not an array, starting with an empty cache");
            return;
        };
        let mut absorbed = 0usize;
        for row in rows {
            match parse_snapshot_entry(row) {
                Some((id, state)) => {
                    dispatcher.dispatch(id, state);
                    absorbed += 1;
                }
                None => debug!("skipping malformed snapshot row"),
            }
        }
        info!(entities = absorbed, "snapshot absorbed");
    }

    /// Translate a device command into the wire request for it.
    pub fn service_request(
        &mut self,
        entity_id: &EntityId,
        value: CommandValue,
    ) -> Result<ClientRequest, CoreError> {
        let (service, service_data) = match (entity_id.domain(), value) {
            (Domain::Light | Domain::Switch, CommandValue::Switch(on)) => (
                if on { "turn_on" } else { "turn_off" }.to_owned(),
                serde_json::json!({ "entity_id": entity_id.as_str() }),
            ),
            (Domain::InputNumber, CommandValue::Number(n)) => (
                "set_value".to_owned(),
                serde_json::json!({ "entity_id": entity_id.as_str(), "value": n }),
            ),
            (Domain::Light | Domain::Switch | Domain::InputNumber, _) => {
                return Err(CoreError::InvalidCommand {
                    entity_id: entity_id.as_str().to_owned(),
                    reason: "command value does not match the entity's domain".to_owned(),
                });
            }
            _ => {
                return Err(CoreError::UnsupportedEntity {
                    entity_id: entity_id.as_str().to_owned(),
                });
            }
        };
        Ok(ClientRequest::CallService {
            id: self.next_id(),
            domain: entity_id.domain_str().to_owned(),
            service,
            service_data,
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// A `state_changed` event carries the entity id at the top of `data`
/// and the full state object under `new_state`.
fn parse_snapshot_entry_from_event(
    data: &serde_json::Value,
) -> Option<(EntityId, homelink_api::EntityState)> {
    let id = data.get("entity_id")?.as_str()?;
    let state = homelink_api::EntityState::from_value(data.get("new_state")?)?;
    Some((EntityId::from(id), state))
}

// ── Tests ───────────────────────────────────────────────────────────
