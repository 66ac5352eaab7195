pub mod time;

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

/// # Summary
/// Bearer token issued by the downstream API for one sync run.
///
/// # Invariants
/// - The secret never appears in `Debug` output, so the token can travel
///   through `tracing` fields without leaking.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Raw token value for the `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// # Summary
/// Sentinel end date meaning "currently in force, no known end".
///
/// # Returns
/// `9999-12-31T23:59:59`, the value the downstream store writes for open windows.
pub fn far_future() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .unwrap_or(NaiveDateTime::MAX)
}

/// Any timestamp on the sentinel day counts as the sentinel; the store may
/// round-trip it with or without fractional seconds.
pub fn is_far_future(value: NaiveDateTime) -> bool {
    value.date() == far_future().date()
}
