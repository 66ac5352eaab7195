use crate::merge::merge;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tarifsync_core::common::time::TimeProvider;
use tarifsync_core::common::{AccessToken, far_future, is_far_future};
use tarifsync_core::store::error::StoreError;
use tarifsync_core::store::port::PersistenceSink;
use tarifsync_core::tariff::entity::{CombinedTariff, SystemTariffCategory, Tax};
use tarifsync_core::tariff::error::{MergeError, UpstreamError};
use tarifsync_core::tariff::port::TariffSource;
use tracing::{debug, error, info, warn};

/// How the system tariff loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemOutcome {
    // stored windows reach past now, or the bootstrap query already ran
    CaughtUp,
    // the stored windows did not move after a write
    NoProgress,
    // upstream had no records for the queried date
    NoData(NaiveDate),
    FetchFailed(UpstreamError),
    Incomplete(Vec<SystemTariffCategory>),
    // the latest stored tax or tariff could not be read
    StoreUnavailable(StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemReport {
    pub outcome: SystemOutcome,
    // every date queried upstream, in order
    pub dates: Vec<NaiveDate>,
    pub taxes_written: usize,
    pub tarifs_written: usize,
    // merged rows identical to the latest stored ones, not sent again
    pub unchanged: usize,
    pub failed_writes: usize,
}

/// # Summary
/// Owner-less catch-up of the national tax and system tariffs.
///
/// # Invariants
/// - The cursor is the earlier end of the latest stored tax and tariff,
///   re-read from the store on every iteration.
/// - An unset or open-ended cursor queries "yesterday" at most once per run.
/// - A merged tax or tariff equal to the latest stored one is not written.
pub struct SystemReconciler {
    source: Arc<dyn TariffSource>,
    sink: Arc<dyn PersistenceSink>,
    clock: Arc<dyn TimeProvider>,
}

impl SystemReconciler {
    pub fn new(
        source: Arc<dyn TariffSource>,
        sink: Arc<dyn PersistenceSink>,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            source,
            sink,
            clock,
        }
    }

    /// # Summary
    /// Advances the stored tax and tariff windows until they reach now.
    ///
    /// # Logic
    /// 1. Read the latest tax and tariff; cursor = min of their ends, unset
    ///    counting as the sentinel.
    /// 2. Sentinel: query yesterday once, stop on the next sentinel.
    /// 3. Concrete and before now: query that date, unless the cursor did not
    ///    move since the previous iteration.
    /// 4. Merge and store what differs from the latest rows; a batch missing
    ///    a surcharge stores its tax and ends the loop.
    pub async fn reconcile(&self, token: &AccessToken) -> SystemReport {
        let mut report = SystemReport {
            outcome: SystemOutcome::CaughtUp,
            dates: Vec::new(),
            taxes_written: 0,
            tarifs_written: 0,
            unchanged: 0,
            failed_writes: 0,
        };
        let mut bootstrapped = false;
        let mut previous: Option<NaiveDateTime> = None;

        loop {
            let (latest_tax, latest_tarif) = match self.latest(token).await {
                Ok(latest) => latest,
                Err(e) => {
                    error!("Failed to read latest tax/tarif: {}", e);
                    report.outcome = SystemOutcome::StoreUnavailable(e);
                    return report;
                }
            };
            let cursor = end_of(latest_tax.as_ref().map(|t| t.valid_to))
                .min(end_of(latest_tarif.as_ref().map(|t| t.valid_to)));
            let now = self.clock.now().naive_utc();

            let date = if is_far_future(cursor) {
                if bootstrapped {
                    break;
                }
                bootstrapped = true;
                let yesterday = now.date().pred_opt().unwrap_or(now.date());
                info!("No concrete tax/tarif end stored, querying {}", yesterday);
                yesterday
            } else if cursor >= now {
                break;
            } else if previous.is_some_and(|p| !is_far_future(p) && cursor <= p) {
                warn!("System tariff cursor stuck at {}; stopping", cursor);
                report.outcome = SystemOutcome::NoProgress;
                return report;
            } else {
                cursor.date()
            };
            previous = Some(cursor);
            report.dates.push(date);

            let records = match self.source.fetch_system_tariffs(date).await {
                Ok(records) if records.is_empty() => {
                    warn!("No system tariffs upstream for {}", date);
                    report.outcome = SystemOutcome::NoData(date);
                    return report;
                }
                Ok(records) => records,
                Err(e) => {
                    error!("Failed to fetch system tariffs for {}: {}", date, e);
                    report.outcome = SystemOutcome::FetchFailed(e);
                    return report;
                }
            };

            match merge(&records) {
                Ok(merged) => {
                    if let Some(tax) = &merged.tax {
                        if latest_tax.as_ref() == Some(tax) {
                            debug!("Tax from {} already stored", tax.valid_from);
                            report.unchanged += 1;
                        } else {
                            self.write_tax(token, tax, &mut report).await;
                        }
                    }
                    if latest_tarif.as_ref() == Some(&merged.tariff) {
                        debug!("Tarif from {} already stored", merged.tariff.valid_from);
                        report.unchanged += 1;
                    } else {
                        self.write_tarif(token, &merged.tariff, &mut report).await;
                    }
                }
                Err(err) => {
                    warn!("{} on {}", err, date);
                    let MergeError::Incomplete { missing, tax } = err;
                    if let Some(tax) = &tax {
                        if latest_tax.as_ref() == Some(tax) {
                            report.unchanged += 1;
                        } else {
                            self.write_tax(token, tax, &mut report).await;
                        }
                    }
                    report.outcome = SystemOutcome::Incomplete(missing);
                    return report;
                }
            }
        }

        report
    }

    async fn latest(
        &self,
        token: &AccessToken,
    ) -> Result<(Option<Tax>, Option<CombinedTariff>), StoreError> {
        let tax = self.sink.latest_tax(token).await?;
        let tarif = self.sink.latest_tarif(token).await?;
        Ok((tax, tarif))
    }

    async fn write_tax(&self, token: &AccessToken, tax: &Tax, report: &mut SystemReport) {
        match self.sink.insert_tax(token, tax).await {
            Ok(()) => report.taxes_written += 1,
            Err(e) => {
                error!("Failed to send tax from {}: {}", tax.valid_from, e);
                report.failed_writes += 1;
            }
        }
    }

    async fn write_tarif(&self, token: &AccessToken, tarif: &CombinedTariff, report: &mut SystemReport) {
        match self.sink.insert_tarif(token, tarif).await {
            Ok(()) => report.tarifs_written += 1,
            Err(e) => {
                error!("Failed to send tarif from {}: {}", tarif.valid_from, e);
                report.failed_writes += 1;
            }
        }
    }
}

// unset ends count as the sentinel
fn end_of(valid_to: Option<NaiveDateTime>) -> NaiveDateTime {
    valid_to.unwrap_or_else(far_future)
}
