// ── Core error types ──
//
// User-facing errors from homelink-core. Consumers never see raw HTTP
// or WebSocket errors directly; the `From<homelink_api::Error>` impl
// translates wire-layer failures into domain-appropriate variants.
// Decode faults are deliberately absent: a malformed frame is dropped
// and logged, never surfaced as an error.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to hub at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Hub disconnected")]
    HubDisconnected,

    #[error("Client already connected")]
    AlreadyConnected,

    #[error("Reconnection limit reached after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    // ── Command errors ───────────────────────────────────────────────
    #[error("No command mapping for entity {entity_id}")]
    UnsupportedEntity { entity_id: String },

    #[error("Invalid command for {entity_id}: {reason}")]
    InvalidCommand { entity_id: String, reason: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from wire-layer errors ───────────────────────────────

impl From<homelink_api::Error> for CoreError {
    fn from(err: homelink_api::Error) -> Self {
        match err {
            homelink_api::Error::AuthRejected { message } => {
                CoreError::AuthenticationFailed { message }
            }
            homelink_api::Error::Transport(ref e) => {
                if e.is_connect() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            homelink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            homelink_api::Error::UnsupportedScheme { scheme } => CoreError::Config {
                message: format!("Unsupported URL scheme: {scheme}"),
            },
            homelink_api::Error::WebSocketConnect(reason)
            | homelink_api::Error::WebSocket(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            homelink_api::Error::Api { message, status } => CoreError::Api {
                message,
                status: Some(status),
            },
            homelink_api::Error::Deserialization { message, .. } => CoreError::Api {
                message: format!("Deserialization error: {message}"),
                status: None,
            },
        }
    }
}
