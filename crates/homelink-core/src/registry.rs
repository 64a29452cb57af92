// ── Subscriber registry ──
//
// Dynamic many-to-many mapping from entity ids to the observer handles
// interested in them. How handles are discovered is decoupled from the
// registry itself: direct `register` calls and pluggable
// `ObserverSource`s both feed the same map, and `rebuild` re-queries
// the sources to heal registrations created after the registry was
// first built.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use homelink_api::EntityId;
use tracing::debug;

use crate::update::StateUpdate;

/// An external collaborator capable of receiving typed state updates
/// for one entity. Identity is `Arc` pointer identity: registering the
/// same handle twice for the same id is a no-op.
pub trait StateObserver: Send + Sync {
    fn apply(&self, id: &EntityId, update: &StateUpdate);
}

/// A discovery seam: anything that can enumerate (entity id, observer)
/// pairs on demand. A scene scan is one possible implementation; the
/// registry doesn't care.
pub trait ObserverSource: Send + Sync {
    fn observers(&self) -> Vec<(EntityId, Arc<dyn StateObserver>)>;
}

/// Maps entity ids to insertion-ordered sets of observer handles.
pub struct SubscriberRegistry {
    handles: DashMap<EntityId, Vec<Arc<dyn StateObserver>>>,
    sources: Mutex<Vec<Arc<dyn ObserverSource>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            sources: Mutex::new(Vec::new()),
        }
    }

    /// Add `handle` to `id`'s set. No-op if already present.
    ///
    /// Aliasing policy: registering under a primary-domain id
    /// (`light.*`) with no competing registration for the derived
    /// `switch.*` form also maps the alias to the same handle -- the
    /// hub may expose either control surface for the same device.
    /// This is a policy choice, not an identity guarantee: two
    /// unrelated entities sharing an object id across those domains
    /// would collide.
    pub fn register(&self, id: EntityId, handle: Arc<dyn StateObserver>) {
        let alias = id.switch_alias();
        self.add_handle(id, &handle);

        if let Some(alias) = alias {
            if !self.handles.contains_key(&alias) {
                debug!(alias = %alias, "mapping alternate control surface to same observer");
                self.add_handle(alias, &handle);
            }
        }
    }

    fn add_handle(&self, id: EntityId, handle: &Arc<dyn StateObserver>) {
        let mut entry = self.handles.entry(id).or_default();
        if !entry.iter().any(|existing| Arc::ptr_eq(existing, handle)) {
            entry.push(Arc::clone(handle));
        }
    }

    /// Remove `handle` from `id`'s set, and from its derived alias set
    /// when the alias was created implicitly. Deterministic teardown:
    /// after this returns the handle receives no further updates for
    /// `id`.
    pub fn unregister(&self, id: &EntityId, handle: &Arc<dyn StateObserver>) {
        self.remove_handle(id, handle);
        if let Some(alias) = id.switch_alias() {
            self.remove_handle(&alias, handle);
        }
    }

    fn remove_handle(&self, id: &EntityId, handle: &Arc<dyn StateObserver>) {
        if let Some(mut entry) = self.handles.get_mut(id) {
            entry.retain(|existing| !Arc::ptr_eq(existing, handle));
        }
        self.handles.remove_if(id, |_, handles| handles.is_empty());
    }

    /// All handles registered for `id`, in insertion order. Empty if
    /// none.
    pub fn resolve(&self, id: &EntityId) -> Vec<Arc<dyn StateObserver>> {
        self.handles
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Attach a discovery source and register its current observers.
    pub fn add_source(&self, source: Arc<dyn ObserverSource>) {
        for (id, handle) in source.observers() {
            self.register(id, handle);
        }
        self.sources
            .lock()
            .expect("observer source lock poisoned")
            .push(source);
    }

    /// Re-query every discovery source and re-register all handles.
    ///
    /// Idempotent by construction; used to heal registrations created
    /// after the registry was first built when a lookup misses.
    pub fn rebuild(&self) {
        let sources: Vec<Arc<dyn ObserverSource>> = self
            .sources
            .lock()
            .expect("observer source lock poisoned")
            .clone();

        debug!(sources = sources.len(), "rebuilding subscriber registry");
        for source in sources {
            for (id, handle) in source.observers() {
                self.register(id, handle);
            }
        }
    }

    /// Number of entity ids with at least one handle.
    pub fn entity_count(&self) -> usize {
        self.handles.len()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ───────────────────────────────────────────────────────────
