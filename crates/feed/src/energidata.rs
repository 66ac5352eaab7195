use crate::query::PricelistQuery;
use crate::retry::with_backoff;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tarifsync_core::common::time::TimeProvider;
use tarifsync_core::config::{RetryPolicy, UpstreamConfig};
use tarifsync_core::sync::entity::ChargeOwner;
use tarifsync_core::tariff::entity::{RawTariffRecord, SortDirection};
use tarifsync_core::tariff::error::UpstreamError;
use tarifsync_core::tariff::port::TariffSource;
use tracing::{debug, warn};

/// # Summary
/// Energi Data Service `DatahubPricelist` client.
///
/// # Invariants
/// - One `reqwest` client, reused for every call of a run.
/// - Every call goes through the configured [`RetryPolicy`].
#[derive(Clone)]
pub struct EnergiDataProvider {
    client: Client,
    base_url: String,
    page_limit: u32,
    system_page_limit: u32,
    retry: RetryPolicy,
    clock: Arc<dyn TimeProvider>,
}

/// Dataset response envelope; only `records` is used.
#[derive(Deserialize, Debug)]
struct PricelistResponse {
    #[serde(default)]
    records: Vec<RawTariffRecord>,
}

impl EnergiDataProvider {
    /// # Summary
    /// Creates the client from the upstream section of the configuration.
    ///
    /// # Logic
    /// 1. Build a `reqwest` client with the configured timeout and JSON accept header.
    /// 2. Keep page limits and retry policy for later queries.
    ///
    /// # Arguments
    /// * `config`: upstream settings.
    /// * `clock`: source of "today" for undated probes.
    ///
    /// # Returns
    /// The provider, or `UpstreamError::Network` when the HTTP client cannot be built.
    pub fn new(
        config: &UpstreamConfig,
        clock: Arc<dyn TimeProvider>,
    ) -> Result<Self, UpstreamError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            page_limit: config.page_limit,
            system_page_limit: config.system_page_limit,
            retry: config.retry.clone(),
            clock,
        })
    }

    /// # Summary
    /// Runs `query` with retries.
    ///
    /// # Returns
    /// The page of records; an empty page is a success.
    pub async fn fetch(&self, query: &PricelistQuery) -> Result<Vec<RawTariffRecord>, UpstreamError> {
        debug!("Price list query: {:?}", query.params());
        with_backoff(&self.retry, "Price list query", || self.call(query)).await
    }

    /// One attempt, classifying the failure for the retry loop.
    async fn call(&self, query: &PricelistQuery) -> Result<Vec<RawTariffRecord>, UpstreamError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&query.params())
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: PricelistResponse = resp
            .json()
            .await
            .map_err(|e| UpstreamError::Parse(e.to_string()))?;

        Ok(payload.records)
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }
}

#[async_trait]
impl TariffSource for EnergiDataProvider {
    /// # Summary
    /// Fetches the records of `owner`/`charge_type_code` in force on the check date.
    ///
    /// # Logic
    /// 1. Query with the owner filter, the requested sort and the page limit.
    /// 2. Resolve the check date: the given one, else the first record's
    ///    `ValidFrom` date for ascending queries, else today.
    /// 3. Keep only records that apply on the check date, in upstream order.
    async fn fetch_candidate(
        &self,
        owner: &ChargeOwner,
        charge_type_code: &str,
        sort: SortDirection,
        date: Option<NaiveDate>,
    ) -> Result<Vec<RawTariffRecord>, UpstreamError> {
        let query = PricelistQuery::for_owner(owner, charge_type_code, self.page_limit).sort(sort);
        let records = self.fetch(&query).await?;

        if records.is_empty() {
            warn!(
                "No tariff data upstream for {} ({}) code {}",
                owner.company, owner.gln_number, charge_type_code
            );
            return Ok(records);
        }

        let check_date = match (date, sort) {
            (Some(date), _) => date,
            (None, SortDirection::Ascending) => records
                .first()
                .and_then(RawTariffRecord::valid_from)
                .map(|dt| dt.date())
                .unwrap_or_else(|| self.today()),
            (None, SortDirection::Descending) => self.today(),
        };
        debug!(
            "Checking {} tariff records of {} against {}",
            records.len(),
            owner.gln_number,
            check_date
        );

        Ok(records
            .into_iter()
            .filter(|r| r.applies_on(check_date))
            .collect())
    }

    async fn fetch_system_tariffs(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<RawTariffRecord>, UpstreamError> {
        let query = PricelistQuery::system_tariffs(self.system_page_limit);
        let records = self.fetch(&query).await?;

        if records.is_empty() {
            warn!("No system tariff data upstream");
        }

        Ok(records
            .into_iter()
            .filter(|r| r.applies_on(date))
            .collect())
    }
}
