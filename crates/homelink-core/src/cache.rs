// ── Entity state cache ──
//
// Authoritative map of entity id → last-known state. Mutated only from
// the connection manager's single processing task; reads are wait-free
// and safe from any thread, which is what lets collaborators call
// `get` directly without going through the push path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use homelink_api::{EntityId, EntityState};
use tokio::sync::watch;

/// Authoritative cache of last-known entity states.
///
/// Entries are only ever replaced wholesale -- no partial merge -- and
/// never deleted during a session.
pub struct StateCache {
    entries: DashMap<EntityId, Arc<EntityState>>,
    last_update: watch::Sender<Option<DateTime<Utc>>>,
}

impl StateCache {
    pub fn new() -> Self {
        let (last_update, _) = watch::channel(None);
        Self {
            entries: DashMap::new(),
            last_update,
        }
    }

    /// Unconditionally replace the stored state for `id`.
    pub fn put(&self, id: EntityId, state: Arc<EntityState>) {
        self.entries.insert(id, state);
        // send_replace stores the timestamp even with no subscribers.
        self.last_update.send_replace(Some(Utc::now()));
    }

    /// Synchronous, side-effect-free lookup.
    pub fn get(&self, id: &EntityId) -> Option<Arc<EntityState>> {
        self.entries.get(id).map(|entry| Arc::clone(&entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// When the cache last absorbed a state, or `None` if it never has.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.borrow()
    }

    /// How stale the cache is, or `None` if it was never populated.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_update().map(|t| Utc::now() - t)
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ───────────────────────────────────────────────────────────
