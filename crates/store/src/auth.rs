use crate::client::{DownstreamApi, check_status, read_json};
use async_trait::async_trait;
use serde::Deserialize;
use tarifsync_core::common::AccessToken;
use tarifsync_core::store::error::StoreError;
use tarifsync_core::store::port::AuthProvider;
use tracing::info;

#[derive(Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
}

#[async_trait]
impl AuthProvider for DownstreamApi {
    /// # Summary
    /// Logs in with the configured user.
    ///
    /// # Logic
    /// 1. POST `/auth/login` as a form with `username` and `password`.
    /// 2. Read `access_token` from the JSON response.
    ///
    /// # Returns
    /// The token, `Unauthorized` when the response carries none.
    async fn login(&self) -> Result<AccessToken, StoreError> {
        let resp = self
            .raw()
            .post(self.url("/auth/login"))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let body: LoginResponse = read_json(check_status(resp).await?).await?;
        let token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StoreError::Unauthorized("no access_token in login response".into()))?;

        info!("Login successful");
        Ok(AccessToken::new(token))
    }
}
