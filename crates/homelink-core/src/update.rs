// ── Typed state interpretations ──
//
// One `StateUpdate` per device class. The sync engine stops here: what
// an "on" light or a 0.4 curtain position *looks like* is the
// observer's business.

use homelink_api::{Domain, EntityId, EntityState};
use tracing::debug;

/// Domain-specific interpretation of an entity's new state, delivered
/// to registered observers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateUpdate {
    /// Light / switch / humidifier class. `intensity` is normalized to
    /// [0, 1] from the hub's 0-255 brightness scale; full for entities
    /// that don't report brightness.
    Power { on: bool, intensity: f32 },
    /// Climate class. `heating` distinguishes heat mode from cool/auto.
    Climate { on: bool, heating: bool },
    /// Input-number / curtain class, normalized to [0, 1].
    Position(f32),
}

const BRIGHTNESS_SCALE: f64 = 255.0;

impl StateUpdate {
    /// Derive the interpretation appropriate to `id`'s domain prefix.
    ///
    /// Returns `None` for domains without a typed mapping and for
    /// position states that don't parse as a number; the caller keeps
    /// the raw state cached either way.
    pub fn derive(id: &EntityId, state: &EntityState) -> Option<Self> {
        match id.domain() {
            Domain::Light => Some(Self::Power {
                on: state.state == "on",
                intensity: state
                    .brightness()
                    .map_or(1.0, |b| ((b / BRIGHTNESS_SCALE).clamp(0.0, 1.0)) as f32),
            }),
            Domain::Switch | Domain::Humidifier => Some(Self::Power {
                on: state.state == "on",
                intensity: 1.0,
            }),
            Domain::Climate => Some(Self::Climate {
                on: state.state != "off",
                heating: state.state.trim().eq_ignore_ascii_case("heat"),
            }),
            Domain::InputNumber => match state.state.trim().parse::<f32>() {
                Ok(position) => Some(Self::Position(position.clamp(0.0, 1.0))),
                Err(_) => {
                    debug!(entity = %id, state = %state.state, "position state is not numeric");
                    None
                }
            },
            Domain::Other => None,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
