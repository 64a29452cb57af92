// ── Hub client and connection supervisor ──
//
// `HubClient` is the public handle: cheap to clone, safe to share.
// All socket I/O and cache mutation happens on one spawned supervisor
// task; callers only ever read the cache or enqueue commands, so the
// single-writer discipline holds without any locking on the hot path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use homelink_api::{websocket_endpoint, ClientRequest, EntityId, EntityState, HubSocket};
use secrecy::ExposeSecret;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::cache::StateCache;
use crate::config::HubConfig;
use crate::dispatch::{Dispatcher, StateChange};
use crate::error::CoreError;
use crate::registry::{ObserverSource, StateObserver, SubscriberRegistry};
use crate::session::{CommandValue, FrameOutcome, Session, SessionPhase};

const UPDATE_CHANNEL_CAPACITY: usize = 1024;
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Why a client reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The hub rejected the access token. Reconnecting cannot help.
    AuthRejected,
    /// Consecutive connection losses reached the configured ceiling.
    ReconnectExhausted,
    /// `shutdown` was called.
    Shutdown,
}

/// Observable lifecycle of the hub connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Authenticating,
    Subscribing,
    Ready,
    Reconnecting { attempt: u32 },
    Closed { reason: CloseReason },
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

struct Command {
    entity_id: EntityId,
    value: CommandValue,
}

/// Shared client for one hub. Clones are handles to the same state.
#[derive(Clone)]
pub struct HubClient {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    cache: Arc<StateCache>,
    registry: Arc<SubscriberRegistry>,
    dispatcher: Dispatcher,
    state_tx: watch::Sender<SessionState>,
    updates_tx: broadcast::Sender<StateChange>,
    command_tx: mpsc::Sender<Command>,
    command_rx: Mutex<Option<mpsc::Receiver<Command>>>,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl HubClient {
    pub fn new(config: HubConfig) -> Self {
        let cache = Arc::new(StateCache::new());
        let registry = Arc::new(SubscriberRegistry::new());
        let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(SessionState::Idle);
        let dispatcher = Dispatcher::new(
            Arc::clone(&cache),
            Arc::clone(&registry),
            updates_tx.clone(),
        );
        Self {
            inner: Arc::new(HubInner {
                config,
                cache,
                registry,
                dispatcher,
                state_tx,
                updates_tx,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Spawn the supervisor task and start connecting. At most one
    /// supervisor ever runs per client; a second call fails. Must be
    /// called from within a Tokio runtime.
    pub fn connect(&self) -> Result<(), CoreError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(CoreError::AlreadyConnected);
        }
        let ws_url = websocket_endpoint(&self.inner.config.base_url)?;
        let commands = self
            .inner
            .command_rx
            .lock()
            .map_err(|_| CoreError::AlreadyConnected)?
            .take()
            .ok_or(CoreError::AlreadyConnected)?;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(supervise(inner, ws_url, commands));
        Ok(())
    }

    // ── Observer management ──────────────────────────────────────────

    pub fn register(&self, id: EntityId, handle: Arc<dyn StateObserver>) {
        self.inner.registry.register(id, handle);
    }

    pub fn unregister(&self, id: &EntityId, handle: &Arc<dyn StateObserver>) {
        self.inner.registry.unregister(id, handle);
    }

    pub fn add_source(&self, source: Arc<dyn ObserverSource>) {
        self.inner.registry.add_source(source);
    }

    // ── Cache access ─────────────────────────────────────────────────

    /// Last-known state for `id`, straight from the cache.
    pub fn lookup(&self, id: &EntityId) -> Option<Arc<EntityState>> {
        self.inner.cache.get(id)
    }

    /// How stale the cache is, or `None` if it was never populated.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.inner.cache.data_age()
    }

    // ── Streams ──────────────────────────────────────────────────────

    /// Subscribe to every absorbed state change.
    pub fn updates(&self) -> broadcast::Receiver<StateChange> {
        self.inner.updates_tx.subscribe()
    }

    /// Watch the connection lifecycle.
    pub fn session_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// Block until the first snapshot is absorbed, or fail when the
    /// client reaches a terminal state first.
    pub async fn wait_until_ready(&self) -> Result<(), CoreError> {
        let mut rx = self.inner.state_tx.subscribe();
        loop {
            match *rx.borrow_and_update() {
                SessionState::Ready => return Ok(()),
                SessionState::Closed { reason } => return Err(self.close_error(reason)),
                _ => {}
            }
            if rx.changed().await.is_err() {
                return Err(CoreError::HubDisconnected);
            }
        }
    }

    fn close_error(&self, reason: CloseReason) -> CoreError {
        match reason {
            CloseReason::AuthRejected => CoreError::AuthenticationFailed {
                message: "hub rejected the access token".to_owned(),
            },
            CloseReason::ReconnectExhausted => CoreError::ReconnectExhausted {
                attempts: self.inner.config.max_reconnect_attempts,
            },
            CloseReason::Shutdown => CoreError::HubDisconnected,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Enqueue a device command for the supervisor task to send.
    ///
    /// Fails fast when the session is not `Ready`; the queue never
    /// buffers commands across a reconnect.
    pub fn request_command(
        &self,
        entity_id: EntityId,
        value: CommandValue,
    ) -> Result<(), CoreError> {
        if !self.inner.state_tx.borrow().is_ready() {
            return Err(CoreError::HubDisconnected);
        }
        self.inner
            .command_tx
            .try_send(Command { entity_id, value })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => CoreError::Api {
                    message: "command queue is full".to_owned(),
                    status: None,
                },
                mpsc::error::TrySendError::Closed(_) => CoreError::HubDisconnected,
            })
    }

    /// Stop the supervisor task and close the connection.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}

impl HubInner {
    fn publish(&self, state: SessionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                debug!(from = ?current, to = ?state, "session state change");
                *current = state;
                true
            }
        });
    }

    fn publish_phase(&self, phase: SessionPhase) {
        self.publish(match phase {
            SessionPhase::Authenticating => SessionState::Authenticating,
            SessionPhase::Subscribing => SessionState::Subscribing,
            SessionPhase::Ready => SessionState::Ready,
        });
    }
}

// ── Supervisor task ─────────────────────────────────────────────────

enum SessionEnd {
    ConnectionLost,
    AuthRejected,
    Shutdown,
}

/// Owns the reconnect loop: run one connection to completion, then
/// either back off for the fixed delay or stop for good.
async fn supervise(inner: Arc<HubInner>, ws_url: Url, mut commands: mpsc::Receiver<Command>) {
    let mut attempt: u32 = 0;
    loop {
        match run_session(&inner, &ws_url, &mut commands, &mut attempt).await {
            SessionEnd::AuthRejected => {
                inner.publish(SessionState::Closed {
                    reason: CloseReason::AuthRejected,
                });
                return;
            }
            SessionEnd::Shutdown => {
                inner.publish(SessionState::Closed {
                    reason: CloseReason::Shutdown,
                });
                return;
            }
            SessionEnd::ConnectionLost => {
                attempt += 1;
                if attempt >= inner.config.max_reconnect_attempts {
                    error!(attempt, "reconnection ceiling reached, giving up");
                    inner.publish(SessionState::Closed {
                        reason: CloseReason::ReconnectExhausted,
                    });
                    return;
                }
                info!(
                    attempt,
                    delay_secs = inner.config.reconnect_delay.as_secs(),
                    "connection lost, reconnecting after fixed delay"
                );
                inner.publish(SessionState::Reconnecting { attempt });
                tokio::select! {
                    () = inner.cancel.cancelled() => {
                        inner.publish(SessionState::Closed {
                            reason: CloseReason::Shutdown,
                        });
                        return;
                    }
                    () = tokio::time::sleep(inner.config.reconnect_delay) => {}
                }
            }
        }
    }
}

/// Drive one connection from dial to disconnect.
async fn run_session(
    inner: &Arc<HubInner>,
    ws_url: &Url,
    commands: &mut mpsc::Receiver<Command>,
    attempt: &mut u32,
) -> SessionEnd {
    inner.publish(SessionState::Connecting);
    let mut socket = match HubSocket::connect(ws_url).await {
        Ok(socket) => socket,
        Err(err) => {
            warn!(url = %ws_url, error = %err, "failed to open hub socket");
            return SessionEnd::ConnectionLost;
        }
    };
    // A fresh socket restarts the loss count; the ceiling only counts
    // consecutive failures.
    *attempt = 0;

    inner.publish(SessionState::Authenticating);
    let auth = ClientRequest::Auth {
        access_token: inner.config.access_token.expose_secret().to_owned(),
    };
    if let Err(err) = socket.send(&auth).await {
        warn!(error = %err, "failed to send auth frame");
        return SessionEnd::ConnectionLost;
    }

    let mut session = Session::new();
    let mut out = Vec::new();
    loop {
        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => return SessionEnd::Shutdown,

            command = commands.recv() => {
                let Some(command) = command else {
                    return SessionEnd::Shutdown;
                };
                if session.phase() != SessionPhase::Ready {
                    warn!(entity = %command.entity_id,
                          "dropping command issued before the session was ready");
                    continue;
                }
                match session.service_request(&command.entity_id, command.value) {
                    Ok(request) => {
                        if let Err(err) = socket.send(&request).await {
                            warn!(error = %err, "failed to send command");
                            return SessionEnd::ConnectionLost;
                        }
                    }
                    Err(err) => warn!(error = %err, "rejected command"),
                }
            }

            frame = socket.next_frame() => {
                match frame {
                    Ok(Some(frame)) => {
                        out.clear();
                        if let FrameOutcome::AuthRejected { message } =
                            session.handle_frame(frame, &inner.dispatcher, &mut out)
                        {
                            error!(reason = %message, "hub rejected credentials");
                            return SessionEnd::AuthRejected;
                        }
                        for request in out.drain(..) {
                            if let Err(err) = socket.send(&request).await {
                                warn!(error = %err, "failed to send request");
                                return SessionEnd::ConnectionLost;
                            }
                        }
                        inner.publish_phase(session.phase());
                    }
                    Ok(None) => {
                        info!("hub closed the connection");
                        return SessionEnd::ConnectionLost;
                    }
                    Err(err) => {
                        warn!(error = %err, "hub stream error");
                        return SessionEnd::ConnectionLost;
                    }
                }
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn commands_rejected_before_ready() {
        let client = HubClient::new(HubConfig::default());
        let err = client
            .request_command(EntityId::from("light.kitchen"), CommandValue::Switch(true))
            .unwrap_err();
        assert!(matches!(err, CoreError::HubDisconnected));
    }

    #[tokio::test]
    async fn second_connect_call_is_rejected() {
        let client = HubClient::new(HubConfig {
            base_url: "http://127.0.0.1:1".parse().unwrap(),
            ..HubConfig::default()
        });
        client.connect().unwrap();
        assert!(matches!(
            client.connect(),
            Err(CoreError::AlreadyConnected)
        ));
        client.shutdown();
    }

    #[test]
    fn initial_state_is_idle() {
        let client = HubClient::new(HubConfig::default());
        assert_eq!(*client.session_state().borrow(), SessionState::Idle);
        assert!(client.lookup(&EntityId::from("light.kitchen")).is_none());
        assert!(client.data_age().is_none());
    }

    #[test]
    fn unsupported_scheme_fails_at_connect() {
        let client = HubClient::new(HubConfig {
            base_url: "ftp://hub.local".parse().unwrap(),
            ..HubConfig::default()
        });
        // Runtime is not needed: the URL check happens before spawn.
        assert!(matches!(client.connect(), Err(CoreError::Config { .. })));
    }
}
