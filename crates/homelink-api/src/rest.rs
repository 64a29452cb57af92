// ── One-shot REST client ──
//
// Bearer-token request/response calls against the hub's HTTP API, for
// collaborators that want a single state read or a fire-and-forget
// service call without standing up the stream client.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::model::{EntityId, EntityState};

/// HTTP client for the hub's REST API.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
}

impl RestClient {
    pub fn new(base_url: Url, token: SecretString) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, token: SecretString) -> Self {
        Self {
            http,
            base_url,
            token,
        }
    }

    /// Build a full URL for an API path: `{base}/api/{path}`.
    fn api_url(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/api/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path
        );
        Ok(Url::parse(&full)?)
    }

    /// Fetch the current state of one entity: `GET /api/states/{id}`.
    pub async fn get_state(&self, entity_id: &EntityId) -> Result<EntityState, Error> {
        let url = self.api_url(&format!("states/{entity_id}"))?;
        debug!("GET {url}");

        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status, body));
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;
        EntityState::from_value(&value).ok_or_else(|| Error::Deserialization {
            message: "state payload missing a non-empty `state` field".into(),
            body,
        })
    }

    /// Invoke a hub service: `POST /api/services/{domain}/{service}`.
    ///
    /// Fire-and-forget semantics: the response body is discarded, only
    /// the status code is checked. No retry on failure.
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        service_data: &Value,
    ) -> Result<(), Error> {
        let url = self.api_url(&format!("services/{domain}/{service}"))?;
        debug!("POST {url}");

        let response = self
            .http
            .post(url)
            .bearer_auth(self.token.expose_secret())
            .json(service_data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, body));
        }
        Ok(())
    }
}

fn api_error(status: StatusCode, body: String) -> Error {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Error::AuthRejected {
            message: format!("HTTP {status}"),
        }
    } else {
        Error::Api {
            message: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
            status: status.as_u16(),
        }
    }
}
