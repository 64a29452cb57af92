// ── Wire-level entity model ──
//
// EntityId and EntityState are the two values that cross every layer:
// the WebSocket stream, the REST client, and the core's cache all speak
// in terms of them. Both are decoded exactly once per frame -- nested
// payload fragments are never re-parsed downstream.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Domain ──────────────────────────────────────────────────────────

/// Device-class prefix of an [`EntityId`].
///
/// The prefix determines how a state value is interpreted downstream;
/// the sync engine itself never parses an id beyond it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Light,
    Switch,
    Climate,
    Humidifier,
    InputNumber,
    Other,
}

impl Domain {
    pub fn from_prefix(prefix: &str) -> Self {
        match prefix {
            "light" => Self::Light,
            "switch" => Self::Switch,
            "climate" => Self::Climate,
            "humidifier" => Self::Humidifier,
            "input_number" => Self::InputNumber,
            _ => Self::Other,
        }
    }

    /// A "primary" domain is a directly-controllable device class whose
    /// entities may be exposed by the hub under an alternate prefix as
    /// well (a light that is actually wired through a switch).
    pub fn is_primary(self) -> bool {
        matches!(self, Self::Light)
    }
}

// ── EntityId ────────────────────────────────────────────────────────

/// Opaque identifier for one hub entity: `"{domain}.{object_id}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The raw domain prefix (text before the first `.`).
    pub fn domain_str(&self) -> &str {
        self.0.split('.').next().unwrap_or("")
    }

    /// Classified device-class prefix.
    pub fn domain(&self) -> Domain {
        Domain::from_prefix(self.domain_str())
    }

    /// The local name after the domain prefix.
    pub fn object_id(&self) -> &str {
        match self.0.split_once('.') {
            Some((_, object_id)) => object_id,
            None => &self.0,
        }
    }

    /// The derived `switch.`-prefixed form of this id, for entities the
    /// hub may expose under either of two control surfaces.
    ///
    /// Only meaningful for primary-domain ids; returns `None` otherwise.
    pub fn switch_alias(&self) -> Option<EntityId> {
        if self.domain().is_primary() {
            Some(EntityId(format!("switch.{}", self.object_id())))
        } else {
            None
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── EntityState ─────────────────────────────────────────────────────

/// Last-known state of one entity.
///
/// `state` is the primary status string and is always non-empty for a
/// stored state -- [`EntityState::from_value`] drops malformed payloads
/// instead of caching them. Uses `#[serde(flatten)]` to capture fields
/// beyond the core set, so nothing from the hub is silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Primary status string, e.g. `"on"`, `"off"`, `"heat"`, `"0.75"`.
    pub state: String,

    /// Secondary metadata (brightness level, hvac action, ...).
    #[serde(default)]
    pub attributes: Map<String, Value>,

    /// All remaining fields the hub sends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityState {
    /// Construct a bare state with no attributes (mostly for tests and
    /// synthetic updates).
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attributes: Map::new(),
            extra: Map::new(),
        }
    }

    /// Decode a state object, enforcing the non-empty `state` invariant.
    ///
    /// Returns `None` for payloads that are not objects, lack a `state`
    /// field, or carry an empty one -- such frames are dropped, never cached.
    pub fn from_value(value: &Value) -> Option<Self> {
        let decoded: Self = serde_json::from_value(value.clone()).ok()?;
        if decoded.state.is_empty() {
            return None;
        }
        Some(decoded)
    }

    /// The `brightness` attribute, if present and numeric.
    pub fn brightness(&self) -> Option<f64> {
        self.attributes.get("brightness").and_then(Value::as_f64)
    }
}

/// Parse one entry of a `get_states` snapshot result.
///
/// Entries missing `entity_id` or a well-formed `state` are skipped
/// individually; one bad row never aborts snapshot ingestion.
pub fn parse_snapshot_entry(value: &Value) -> Option<(EntityId, EntityState)> {
    let id = value.get("entity_id")?.as_str()?;
    let state = EntityState::from_value(value)?;
    Some((EntityId::new(id), state))
}

// ── Tests ───────────────────────────────────────────────────────────
