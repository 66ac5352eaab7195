use crate::client::{DownstreamApi, read_json, send};
use async_trait::async_trait;
use tarifsync_core::common::AccessToken;
use tarifsync_core::store::error::StoreError;
use tarifsync_core::store::port::WatermarkSource;
use tarifsync_core::sync::entity::Watermark;
use tracing::info;

#[async_trait]
impl WatermarkSource for DownstreamApi {
    async fn watermark(&self, token: &AccessToken) -> Result<Watermark, StoreError> {
        let resp = send(self.get("/watermark", token)).await?;
        let watermark: Option<Watermark> = read_json(resp).await?;
        let watermark = watermark.ok_or(StoreError::NotFound)?;
        info!("Watermark retrieved: {:?}", watermark);
        Ok(watermark)
    }
}
