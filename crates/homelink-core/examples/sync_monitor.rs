// Minimal live monitor: connect to a hub and print every state change.
//
// Usage:
//   HOMELINK_URL=http://homeassistant.local:8123 \
//   HOMELINK_TOKEN=<long-lived access token> \
//   cargo run -p homelink-core --example sync_monitor

use homelink_core::{HubClient, HubConfig};
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let base_url = std::env::var("HOMELINK_URL")
        .unwrap_or_else(|_| "http://homeassistant.local:8123".to_owned());
    let token = std::env::var("HOMELINK_TOKEN")
        .expect("set HOMELINK_TOKEN to a long-lived access token");

    let config = HubConfig {
        base_url: base_url.parse().expect("HOMELINK_URL must be a valid URL"),
        access_token: SecretString::from(token),
        ..HubConfig::default()
    };

    let client = HubClient::new(config);
    let mut updates = client.updates();
    client.connect().expect("connect is only called once");
    client.wait_until_ready().await.expect("initial synchronization");
    println!("synchronized, watching for changes (ctrl-c to stop)");

    while let Ok(change) = updates.recv().await {
        println!("{} -> {}", change.entity_id, change.state.state);
    }
}
