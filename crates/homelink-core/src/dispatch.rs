// ── Event dispatcher ──
//
// Single funnel for both ingestion paths: bulk snapshot rows and
// incremental change events go through `dispatch`, which is why they
// share the arrival-order guarantee -- whichever is processed later
// wins in the cache.

use std::sync::Arc;

use homelink_api::{EntityId, EntityState};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::cache::StateCache;
use crate::registry::SubscriberRegistry;
use crate::update::StateUpdate;

/// One absorbed state change, as seen by broadcast subscribers.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub entity_id: EntityId,
    pub state: Arc<EntityState>,
}

/// Pushes absorbed states into the cache and out to observers.
pub struct Dispatcher {
    cache: Arc<StateCache>,
    registry: Arc<SubscriberRegistry>,
    updates: broadcast::Sender<StateChange>,
}

impl Dispatcher {
    pub fn new(
        cache: Arc<StateCache>,
        registry: Arc<SubscriberRegistry>,
        updates: broadcast::Sender<StateChange>,
    ) -> Self {
        Self {
            cache,
            registry,
            updates,
        }
    }

    /// Absorb one new state: cache it, notify broadcast subscribers,
    /// and deliver a typed interpretation to every registered observer.
    ///
    /// An empty resolution triggers exactly one registry rebuild and a
    /// second resolution -- that single retry is the full recovery
    /// policy. Still-empty resolution is non-fatal: the state stays
    /// cached for later synchronous lookup.
    pub fn dispatch(&self, id: EntityId, state: EntityState) {
        let state = Arc::new(state);
        self.cache.put(id.clone(), Arc::clone(&state));

        // Send errors just mean no broadcast subscribers right now.
        let _ = self.updates.send(StateChange {
            entity_id: id.clone(),
            state: Arc::clone(&state),
        });

        let mut handles = self.registry.resolve(&id);
        if handles.is_empty() {
            debug!(entity = %id, "no observers resolved, rebuilding registry once");
            self.registry.rebuild();
            handles = self.registry.resolve(&id);
        }
        if handles.is_empty() {
            trace!(entity = %id, "state cached with no observers to notify");
            return;
        }

        let Some(update) = StateUpdate::derive(&id, &state) else {
            trace!(entity = %id, "no typed interpretation for this domain");
            return;
        };

        for handle in &handles {
            // A panicking observer must not take down the processing
            // loop; the failure stays local to this delivery.
            let delivery = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handle.apply(&id, &update);
            }));
            if delivery.is_err() {
                warn!(entity = %id, "observer panicked while applying an update");
            }
        }
        debug!(entity = %id, observers = handles.len(), ?update, "dispatched state update");
    }
}

// ── Tests ───────────────────────────────────────────────────────────
