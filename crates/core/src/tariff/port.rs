use crate::sync::entity::ChargeOwner;
use crate::tariff::entity::{RawTariffRecord, SortDirection};
use crate::tariff::error::UpstreamError;
use async_trait::async_trait;
use chrono::NaiveDate;

/// # Summary
/// Read side of the upstream price list.
///
/// # Invariants
/// - `Ok(vec![])` means "no more data"; `Err` means the call itself failed
///   (after the implementation's own retries).
/// - Returned records are already narrowed to those in force on the check
///   date and keep the requested sort order, so the first one is the
///   candidate.
#[async_trait]
pub trait TariffSource: Send + Sync {
    /// # Summary
    /// Fetches the owner's tariff records for one charge type code.
    ///
    /// # Logic
    /// 1. Filter on the exact code, the owner's GLN and its charge types.
    /// 2. Sort on `ValidFrom` in `sort` order, capped at the page limit.
    /// 3. Keep records in force on `date`. Without a date, ascending queries
    ///    use the first record's `ValidFrom` date and descending ones today.
    ///
    /// # Arguments
    /// * `owner`: the charge owner.
    /// * `charge_type_code`: one of the owner's codes.
    /// * `sort`: ascending to bootstrap, descending to probe.
    /// * `date`: the check date.
    ///
    /// # Returns
    /// Relevant records, possibly empty.
    async fn fetch_candidate(
        &self,
        owner: &ChargeOwner,
        charge_type_code: &str,
        sort: SortDirection,
        date: Option<NaiveDate>,
    ) -> Result<Vec<RawTariffRecord>, UpstreamError>;

    /// # Summary
    /// Fetches the national tax and system tariff records in force on `date`.
    async fn fetch_system_tariffs(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<RawTariffRecord>, UpstreamError>;
}
