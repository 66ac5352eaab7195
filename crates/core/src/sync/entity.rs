use crate::common::{far_future, is_far_future, time::lenient_opt};
use crate::tariff::entity::NormalizedTariffRecord;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// # Summary
/// Latest date up to which each entity class is synchronized downstream.
///
/// # Invariants
/// - Read once at the start of a run and never written by this process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    #[serde(default, with = "lenient_opt")]
    pub spotprices_max_date: Option<NaiveDateTime>,
    #[serde(default, with = "lenient_opt")]
    pub charges_max_date: Option<NaiveDateTime>,
    #[serde(default, with = "lenient_opt")]
    pub taxes_max_date: Option<NaiveDateTime>,
    #[serde(default, with = "lenient_opt")]
    pub tarifs_max_date: Option<NaiveDateTime>,
}

/// # Summary
/// Identity of a grid company that publishes its own tariffs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeOwner {
    pub id: i64,
    pub gln_number: String,
    pub company: String,
    // upstream `ChargeType` values, e.g. ["D03"]
    pub charge_types: Vec<String>,
    // upstream `ChargeTypeCode` values, one catch-up per code
    pub charge_type_codes: Vec<String>,
}

/// Where an owner's catch-up currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchUpPhase {
    // no stored window yet
    Uninitialized,
    // has a window, a newer one may exist upstream
    Probing,
    // nothing newer to look for during this run
    CaughtUp,
}

/// # Summary
/// Last known validity window of an owner's charges.
///
/// # Invariants
/// - `valid_to == None` with `valid_from` set is read as the sentinel.
/// - `is_checked` is only set once upstream confirmed the window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeWindow {
    pub valid_from: Option<NaiveDateTime>,
    pub valid_to: Option<NaiveDateTime>,
    pub is_checked: bool,
}

impl ChargeWindow {
    /// End of the window, or `None` when the owner was never initialized.
    pub fn cursor(&self) -> Option<NaiveDateTime> {
        self.valid_from
            .map(|_| self.valid_to.unwrap_or_else(far_future))
    }

    /// # Summary
    /// Classifies the window against `now`.
    ///
    /// # Logic
    /// 1. No `valid_from` → `Uninitialized`.
    /// 2. Sentinel end: `CaughtUp` when checked, otherwise `Probing`.
    /// 3. Concrete end: `Probing` while it lies before `now`.
    pub fn phase(&self, now: NaiveDateTime) -> CatchUpPhase {
        match self.cursor() {
            None => CatchUpPhase::Uninitialized,
            Some(end) if is_far_future(end) => {
                if self.is_checked {
                    CatchUpPhase::CaughtUp
                } else {
                    CatchUpPhase::Probing
                }
            }
            Some(end) if end < now => CatchUpPhase::Probing,
            Some(_) => CatchUpPhase::CaughtUp,
        }
    }

    /// Takes over `record`'s window and marks it confirmed.
    pub fn adopt(&mut self, record: &NormalizedTariffRecord) {
        self.valid_from = Some(record.valid_from);
        self.valid_to = Some(record.valid_to_or_sentinel());
        self.is_checked = true;
    }
}

/// # Summary
/// An owner together with its mutable catch-up window for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeOwnerState {
    pub owner: ChargeOwner,
    pub window: ChargeWindow,
}
