use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tarifsync_core::common::AccessToken;
use tarifsync_core::config::ApiConfig;
use tarifsync_core::store::error::StoreError;

/// # Summary
/// REST client for the downstream tariff store.
///
/// # Invariants
/// - `base_url` carries no trailing slash.
/// - The `reqwest` client is shared by every call of a run.
#[derive(Clone)]
pub struct DownstreamApi {
    client: Client,
    base_url: String,
    pub(crate) username: String,
    pub(crate) password: String,
}

impl DownstreamApi {
    /// # Summary
    /// Creates the client from the `api` configuration section.
    ///
    /// # Returns
    /// `StoreError::Network` when the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn get(&self, path: &str, token: &AccessToken) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .bearer_auth(token.secret())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    pub(crate) fn post(&self, path: &str, token: &AccessToken) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .bearer_auth(token.secret())
    }

    pub(crate) fn raw(&self) -> &Client {
        &self.client
    }
}

/// Sends `request`, mapping transport failures to `StoreError::Network`.
pub(crate) async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
    let resp = request
        .send()
        .await
        .map_err(|e| StoreError::Network(e.to_string()))?;
    check_status(resp).await
}

/// # Summary
/// Turns a non-success response into the matching `StoreError`.
///
/// # Logic
/// 1. 2xx passes through.
/// 2. 401/403 → `Unauthorized`, 404 → `NotFound`.
/// 3. Anything else → `Status` with the response body.
pub(crate) async fn check_status(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(body),
        StatusCode::NOT_FOUND => StoreError::NotFound,
        _ => StoreError::Status {
            status: status.as_u16(),
            body,
        },
    })
}

pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, StoreError> {
    resp.json()
        .await
        .map_err(|e| StoreError::Parse(e.to_string()))
}
