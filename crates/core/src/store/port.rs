use super::error::StoreError;
use crate::common::AccessToken;
use crate::sync::entity::{ChargeOwner, ChargeOwnerState, Watermark};
use crate::tariff::entity::{CombinedTariff, NormalizedTariffRecord, Tax};
use async_trait::async_trait;

/// # Summary
/// Acquires the bearer token for a sync run.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// # Summary
    /// Logs in with the configured credentials.
    ///
    /// # Returns
    /// The token, or `StoreError` when the store refuses or is unreachable.
    /// Either way the caller treats a failure as fatal to the run.
    async fn login(&self) -> Result<AccessToken, StoreError>;
}

/// # Summary
/// Per entity class synchronization watermark.
#[async_trait]
pub trait WatermarkSource: Send + Sync {
    async fn watermark(&self, token: &AccessToken) -> Result<Watermark, StoreError>;
}

/// # Summary
/// Directory of charge owners with their latest stored validity window.
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    /// # Summary
    /// Loads every charge owner together with the window of its newest charge.
    ///
    /// # Returns
    /// Fresh state for this run; nothing is cached between runs.
    async fn charge_owners_with_last_charge(
        &self,
        token: &AccessToken,
    ) -> Result<Vec<ChargeOwnerState>, StoreError>;
}

/// # Summary
/// Write sink for normalized records, plus the reads the system tariff loop
/// needs to find where it left off.
///
/// # Invariants
/// - Writes are at-least-once; implementations rely on the store's own
///   uniqueness constraints.
/// - A failed write never rolls back earlier writes of the same run.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// # Summary
    /// Stores one owner tariff record.
    ///
    /// # Arguments
    /// * `record`: normalized record; a missing `valid_to` is sent as the sentinel.
    /// * `owner`: the owner the record belongs to.
    /// * `token`: bearer token of the run.
    async fn insert_charge(
        &self,
        record: &NormalizedTariffRecord,
        owner: &ChargeOwner,
        token: &AccessToken,
    ) -> Result<(), StoreError>;

    async fn insert_tax(&self, token: &AccessToken, tax: &Tax) -> Result<(), StoreError>;

    async fn insert_tarif(
        &self,
        token: &AccessToken,
        tarif: &CombinedTariff,
    ) -> Result<(), StoreError>;

    /// Newest stored tax, `None` when the store has none yet.
    async fn latest_tax(&self, token: &AccessToken) -> Result<Option<Tax>, StoreError>;

    /// Newest stored combined tariff, `None` when the store has none yet.
    async fn latest_tarif(&self, token: &AccessToken)
    -> Result<Option<CombinedTariff>, StoreError>;
}
