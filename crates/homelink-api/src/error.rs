use thiserror::Error;

/// Top-level error type for the `homelink-api` crate.
///
/// Covers every failure mode across both API surfaces: WebSocket
/// connection/framing and the one-shot REST client. `homelink-core`
/// maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The hub rejected the presented access token.
    #[error("Authentication rejected by hub: {message}")]
    AuthRejected { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The base URL uses a scheme with no WebSocket counterpart.
    #[error("Unsupported URL scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket transport error mid-session.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    // ── REST API ────────────────────────────────────────────────────
    /// Non-success response from the hub's REST API.
    #[error("Hub API error (HTTP {status}): {message}")]
    Api { message: String, status: u16 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}
