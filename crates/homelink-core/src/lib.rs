//! State-synchronization layer between `homelink-api` and embedding
//! applications.
//!
//! This crate owns the connection lifecycle, the entity-state cache,
//! and observer delivery for the HomeLink workspace:
//!
//! - **[`HubClient`]** — Central facade managing the full lifecycle:
//!   [`connect()`](HubClient::connect) spawns a supervisor task that
//!   authenticates over WebSocket, subscribes to state-change events,
//!   absorbs a bulk snapshot, and keeps reconnecting with a fixed
//!   delay until the configured attempt ceiling is reached.
//!
//! - **[`StateCache`]** — Lock-free last-known-state storage built on
//!   `DashMap`, replaced wholesale per entity and readable from any
//!   thread without touching the connection task.
//!
//! - **[`SubscriberRegistry`]** — Maps entity ids to
//!   [`StateObserver`] handles, with a one-shot rebuild pass that
//!   heals registrations made before their observers existed.
//!
//! - **[`Dispatcher`]** — The single ingestion funnel: every snapshot
//!   row and live event is cached, broadcast, and translated into a
//!   typed [`StateUpdate`] for registered observers.
//!
//! - **Commands** ([`CommandValue`]) — Device mutations routed through
//!   an `mpsc` channel to the supervisor task, which owns the socket.
//!   Reads never go through the channel; they hit the cache directly.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod registry;
pub mod session;
pub mod update;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::StateCache;
pub use config::HubConfig;
pub use dispatch::{Dispatcher, StateChange};
pub use error::CoreError;
pub use hub::{CloseReason, HubClient, SessionState};
pub use registry::{ObserverSource, StateObserver, SubscriberRegistry};
pub use session::CommandValue;
pub use update::StateUpdate;

// Re-export wire-layer types consumers routinely touch.
pub use homelink_api::{Domain, EntityId, EntityState, RestClient};
