// ── Runtime connection configuration ──
//
// Describes *how* to reach a hub. Carries the credential and reconnect
// tuning, but never touches disk -- the embedding layer constructs a
// `HubConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// Configuration for connecting to a single hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Hub base URL (e.g. `http://homeassistant.local:8123`). The
    /// stream endpoint is derived from it.
    pub base_url: Url,
    /// Long-lived access token presented during the auth handshake.
    pub access_token: SecretString,
    /// Fixed delay between reconnection attempts (no backoff).
    pub reconnect_delay: Duration,
    /// Attempt ceiling; exceeding it is terminal for the session.
    pub max_reconnect_attempts: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_url: "http://homeassistant.local:8123"
                .parse()
                .expect("default hub URL is valid"),
            access_token: SecretString::from(String::new()),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 10,
        }
    }
}
