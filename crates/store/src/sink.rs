use crate::client::{DownstreamApi, read_json, send};
use crate::payload::{ChargePayload, TarifPayload, TaxPayload};
use async_trait::async_trait;
use tarifsync_core::common::AccessToken;
use tarifsync_core::store::error::StoreError;
use tarifsync_core::store::port::PersistenceSink;
use tarifsync_core::sync::entity::ChargeOwner;
use tarifsync_core::tariff::entity::{CombinedTariff, NormalizedTariffRecord, Tax};
use tracing::{debug, info};

impl DownstreamApi {
    /// # Summary
    /// GET a "latest" endpoint that answers `null` or 404 when empty.
    async fn latest<P, T>(&self, path: &str, token: &AccessToken) -> Result<Option<T>, StoreError>
    where
        P: serde::de::DeserializeOwned,
        T: TryFrom<P, Error = StoreError>,
    {
        let resp = match send(self.get(path, token)).await {
            Ok(resp) => resp,
            Err(StoreError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        let payload: Option<P> = read_json(resp).await?;
        payload.map(T::try_from).transpose()
    }
}

#[async_trait]
impl PersistenceSink for DownstreamApi {
    async fn insert_charge(
        &self,
        record: &NormalizedTariffRecord,
        owner: &ChargeOwner,
        token: &AccessToken,
    ) -> Result<(), StoreError> {
        let payload = ChargePayload { owner, record };
        debug!(
            "Inserting charge for owner {}: {:?}",
            owner.id,
            serde_json::to_string(&payload)
        );
        send(self.post("/charge", token).json(&payload)).await?;
        info!(
            "Charge submitted for {} ({}), valid from {}",
            owner.company, record.charge_type_code, record.valid_from
        );
        Ok(())
    }

    async fn insert_tax(&self, token: &AccessToken, tax: &Tax) -> Result<(), StoreError> {
        send(self.post("/tax", token).json(&TaxPayload::from(tax))).await?;
        info!("Tax sent, valid from {}", tax.valid_from);
        Ok(())
    }

    async fn insert_tarif(
        &self,
        token: &AccessToken,
        tarif: &CombinedTariff,
    ) -> Result<(), StoreError> {
        send(self.post("/tarif", token).json(&TarifPayload::from(tarif))).await?;
        info!("Tarif sent, valid from {}", tarif.valid_from);
        Ok(())
    }

    async fn latest_tax(&self, token: &AccessToken) -> Result<Option<Tax>, StoreError> {
        self.latest::<TaxPayload, Tax>("/tax/latest", token).await
    }

    async fn latest_tarif(
        &self,
        token: &AccessToken,
    ) -> Result<Option<CombinedTariff>, StoreError> {
        self.latest::<TarifPayload, CombinedTariff>("/tarif/latest", token)
            .await
    }
}
