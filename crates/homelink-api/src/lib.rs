// homelink-api: Async Rust client for the Home Assistant WebSocket and REST APIs

pub mod error;
pub mod model;
pub mod protocol;
pub mod rest;
pub mod socket;

pub use error::Error;
pub use model::{Domain, EntityId, EntityState, parse_snapshot_entry};
pub use protocol::{
    ClientRequest, EventEnvelope, STATE_CHANGED, ServerFrame, decode_frame, websocket_endpoint,
};
pub use rest::RestClient;
pub use socket::HubSocket;
