use crate::normalize::normalize;
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use tarifsync_core::common::time::TimeProvider;
use tarifsync_core::common::{AccessToken, is_far_future};
use tarifsync_core::store::port::PersistenceSink;
use tarifsync_core::sync::entity::{CatchUpPhase, ChargeOwner, ChargeOwnerState, ChargeWindow};
use tarifsync_core::tariff::entity::{NormalizedTariffRecord, RawTariffRecord, SortDirection};
use tarifsync_core::tariff::error::UpstreamError;
use tarifsync_core::tariff::port::TariffSource;
use tracing::{debug, error, info, warn};

/// How the catch-up of one charge type code ended.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnerOutcome {
    // nothing newer upstream, or the window already reaches past now
    CaughtUp,
    // no record at all upstream for this code
    Uninitialized,
    // a probe from a concrete end date came back empty
    NoFurtherData,
    // upstream answered with a window that does not move the cursor forward
    NoProgress,
    FetchFailed(UpstreamError),
    // the candidate record could not be normalized
    Malformed,
}

/// Result of the catch-up of one charge type code.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeReport {
    pub charge_type_code: String,
    pub outcome: OwnerOutcome,
    pub inserted: usize,
    pub failed_writes: usize,
}

/// Result of reconciling one owner across all of its codes.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerReport {
    pub owner_id: i64,
    pub company: String,
    pub codes: Vec<CodeReport>,
}

impl OwnerReport {
    pub fn inserted(&self) -> usize {
        self.codes.iter().map(|c| c.inserted).sum()
    }

    pub fn failed_writes(&self) -> usize {
        self.codes.iter().map(|c| c.failed_writes).sum()
    }
}

/// # Summary
/// Per-owner catch-up state machine.
///
/// # Invariants
/// - Every probe either moves the owner's cursor to a later date or ends the
///   loop, so a run touches each distinct upstream window at most once.
/// - A failed write is logged and counted; the cursor still advances.
pub struct OwnerReconciler {
    source: Arc<dyn TariffSource>,
    sink: Arc<dyn PersistenceSink>,
    clock: Arc<dyn TimeProvider>,
    insert_delay: Duration,
}

impl OwnerReconciler {
    /// # Arguments
    /// * `source`: upstream price list.
    /// * `sink`: downstream store.
    /// * `clock`: decides what "now" is.
    /// * `insert_delay`: pause after each charge write to spare the store.
    pub fn new(
        source: Arc<dyn TariffSource>,
        sink: Arc<dyn PersistenceSink>,
        clock: Arc<dyn TimeProvider>,
        insert_delay: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            clock,
            insert_delay,
        }
    }

    /// # Summary
    /// Catches one owner up on every charge type code it publishes.
    ///
    /// # Logic
    /// 1. Each code starts from the window loaded for the owner.
    /// 2. The owner keeps the furthest window any of its codes reached.
    ///
    /// # Arguments
    /// * `state`: owner and window, updated in place.
    /// * `token`: bearer token of the run.
    pub async fn reconcile(&self, state: &mut ChargeOwnerState, token: &AccessToken) -> OwnerReport {
        let owner = &state.owner;
        let mut report = OwnerReport {
            owner_id: owner.id,
            company: owner.company.clone(),
            codes: Vec::with_capacity(owner.charge_type_codes.len()),
        };
        if owner.charge_type_codes.is_empty() {
            warn!("Charge owner {} ({}) has no charge type codes", owner.company, owner.gln_number);
            return report;
        }

        let loaded = state.window.clone();
        let mut furthest = loaded.clone();
        for code in &owner.charge_type_codes {
            info!(
                "Charge owner: {}, company: {}, charge types: {:?}, code: {}",
                owner.gln_number, owner.company, owner.charge_types, code
            );
            let mut window = loaded.clone();
            let mut code_report = CodeReport {
                charge_type_code: code.clone(),
                outcome: OwnerOutcome::CaughtUp,
                inserted: 0,
                failed_writes: 0,
            };
            let outcome = self
                .catch_up(owner, code, &mut window, token, &mut code_report)
                .await;
            code_report.outcome = outcome;
            info!(
                "Charge owner {} code {} finished: {:?}, {} inserted",
                owner.gln_number, code, code_report.outcome, code_report.inserted
            );
            if reach(&window) > reach(&furthest) {
                furthest = window;
            }
            report.codes.push(code_report);
        }

        state.window = furthest;
        report
    }

    /// # Summary
    /// Runs the state machine for one code.
    ///
    /// # Logic
    /// 1. Uninitialized: fetch the oldest record ascending; adopt and store it.
    /// 2. Open window not yet confirmed: probe descending at the sentinel
    ///    date. A different `valid_from` means a new window; the same one
    ///    means caught up and the window stays unconfirmed.
    /// 3. Concrete end before now: probe descending at that date; adopt and
    ///    store the record, stopping on an empty answer or a window that
    ///    ends no later than the probed date.
    async fn catch_up(
        &self,
        owner: &ChargeOwner,
        code: &str,
        window: &mut ChargeWindow,
        token: &AccessToken,
        report: &mut CodeReport,
    ) -> OwnerOutcome {
        if window.phase(self.now()) == CatchUpPhase::Uninitialized {
            let raw = match self
                .candidate(owner, code, SortDirection::Ascending, None)
                .await
            {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    info!("No tariffs upstream for {} {}, owner stays uninitialized", owner.gln_number, code);
                    return OwnerOutcome::Uninitialized;
                }
                Err(e) => return OwnerOutcome::FetchFailed(e),
            };
            let Some(record) = normalize(&raw) else {
                return OwnerOutcome::Malformed;
            };
            window.adopt(&record);
            self.persist(&record, owner, token, report).await;
        }

        loop {
            let Some(cursor) = window.cursor() else {
                return OwnerOutcome::Uninitialized;
            };
            if window.phase(self.now()) != CatchUpPhase::Probing {
                return OwnerOutcome::CaughtUp;
            }

            let raw = match self
                .candidate(owner, code, SortDirection::Descending, Some(cursor))
                .await
            {
                Ok(Some(raw)) => raw,
                Ok(None) if is_far_future(cursor) => return OwnerOutcome::CaughtUp,
                Ok(None) => return OwnerOutcome::NoFurtherData,
                Err(e) => return OwnerOutcome::FetchFailed(e),
            };
            let Some(record) = normalize(&raw) else {
                return OwnerOutcome::Malformed;
            };

            if is_far_future(cursor) {
                if window.valid_from == Some(record.valid_from) {
                    debug!("Open window of {} {} unchanged upstream", owner.gln_number, code);
                    return OwnerOutcome::CaughtUp;
                }
            } else if record.valid_to_or_sentinel() <= cursor {
                warn!(
                    "Upstream window for {} {} ends {}, not after {}; stopping",
                    owner.gln_number,
                    code,
                    record.valid_to_or_sentinel(),
                    cursor
                );
                return OwnerOutcome::NoProgress;
            }

            window.adopt(&record);
            self.persist(&record, owner, token, report).await;
        }
    }

    /// First relevant record of a query, `None` when upstream has nothing.
    async fn candidate(
        &self,
        owner: &ChargeOwner,
        code: &str,
        sort: SortDirection,
        cursor: Option<NaiveDateTime>,
    ) -> Result<Option<RawTariffRecord>, UpstreamError> {
        let date = cursor.map(|d| d.date());
        debug!("Fetching {} {} sorted {} at {:?}", owner.gln_number, code, sort, date);
        match self.source.fetch_candidate(owner, code, sort, date).await {
            Ok(records) => Ok(records.into_iter().next()),
            Err(e) => {
                error!("Failed to fetch tariffs for {} {}: {}", owner.gln_number, code, e);
                Err(e)
            }
        }
    }

    async fn persist(
        &self,
        record: &NormalizedTariffRecord,
        owner: &ChargeOwner,
        token: &AccessToken,
        report: &mut CodeReport,
    ) {
        match self.sink.insert_charge(record, owner, token).await {
            Ok(()) => report.inserted += 1,
            Err(e) => {
                error!(
                    "Failed to insert charge {} from {} for {}: {}",
                    record.charge_type_code, record.valid_from, owner.gln_number, e
                );
                report.failed_writes += 1;
            }
        }
        if !self.insert_delay.is_zero() {
            tokio::time::sleep(self.insert_delay).await;
        }
    }

    fn now(&self) -> NaiveDateTime {
        self.clock.now().naive_utc()
    }
}

// Orders windows by how far they reach; a confirmed window beats an
// unconfirmed one with the same end.
fn reach(window: &ChargeWindow) -> (Option<NaiveDateTime>, bool) {
    (window.cursor(), window.is_checked)
}
