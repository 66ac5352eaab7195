use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tarifsync_core::common::time::FakeClockProvider;
use tarifsync_core::common::{AccessToken, far_future};
use tarifsync_core::sync::entity::{ChargeOwner, ChargeOwnerState, ChargeWindow};
use tarifsync_core::tariff::entity::{RawTariffRecord, SortDirection};
use tarifsync_core::tariff::error::UpstreamError;
use tarifsync_core::test_utils::{MemorySink, ScriptedTariffSource, tariff_record};
use tarifsync_reconcile::owner::{OwnerOutcome, OwnerReconciler};

const GLN: &str = "5790000610877";

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn state(codes: &[&str], window: ChargeWindow) -> ChargeOwnerState {
    ChargeOwnerState {
        owner: ChargeOwner {
            id: 1,
            gln_number: GLN.to_string(),
            company: "Radius Elnet A/S".to_string(),
            charge_types: vec!["D03".to_string()],
            charge_type_codes: codes.iter().map(|c| c.to_string()).collect(),
        },
        window,
    }
}

fn window(from: NaiveDateTime, to: Option<NaiveDateTime>, is_checked: bool) -> ChargeWindow {
    ChargeWindow {
        valid_from: Some(from),
        valid_to: to,
        is_checked,
    }
}

struct Harness {
    source: Arc<ScriptedTariffSource>,
    sink: Arc<MemorySink>,
    reconciler: OwnerReconciler,
    token: AccessToken,
}

fn harness(now: NaiveDateTime) -> Harness {
    let source = Arc::new(ScriptedTariffSource::new());
    let sink = Arc::new(MemorySink::new());
    let clock = Arc::new(FakeClockProvider::new(Utc.from_utc_datetime(&now)));
    let reconciler = OwnerReconciler::new(source.clone(), sink.clone(), clock, Duration::ZERO);
    Harness {
        source,
        sink,
        reconciler,
        token: AccessToken::new("test-token"),
    }
}

#[tokio::test]
async fn test_bootstrap_uninitialized_owner() {
    let h = harness(at(2024, 7, 1));
    h.source.push_candidate(
        GLN,
        "CD",
        Ok(vec![
            tariff_record("CD", "2024-01-01T00:00:00", None),
            tariff_record("CD", "2024-05-01T00:00:00", None),
        ]),
    );
    let mut owner = state(&["CD"], ChargeWindow::default());

    let report = h.reconciler.reconcile(&mut owner, &h.token).await;

    assert_eq!(report.codes[0].outcome, OwnerOutcome::CaughtUp);
    assert_eq!(report.inserted(), 1);
    let requests = h.source.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].sort, SortDirection::Ascending);
    assert_eq!(requests[0].date, None);

    assert_eq!(owner.window.valid_from, Some(at(2024, 1, 1)));
    assert_eq!(owner.window.valid_to, Some(far_future()));
    assert!(owner.window.is_checked);

    let charges = h.sink.charges().await;
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].0, 1);
    assert_eq!(charges[0].1.valid_from, at(2024, 1, 1));
}

#[tokio::test]
async fn test_nothing_upstream_leaves_owner_uninitialized() {
    let h = harness(at(2024, 7, 1));
    let mut owner = state(&["CD"], ChargeWindow::default());

    let report = h.reconciler.reconcile(&mut owner, &h.token).await;

    assert_eq!(report.codes[0].outcome, OwnerOutcome::Uninitialized);
    assert_eq!(owner.window, ChargeWindow::default());
    assert!(h.sink.charges().await.is_empty());
}

#[tokio::test]
async fn test_caught_up_owners_write_nothing() {
    let h = harness(at(2024, 7, 1));
    let mut future_end = state(&["CD"], window(at(2024, 1, 1), Some(at(2024, 10, 1)), true));
    let mut open_checked = state(&["CD"], window(at(2024, 1, 1), None, true));

    let first = h.reconciler.reconcile(&mut future_end, &h.token).await;
    let second = h.reconciler.reconcile(&mut open_checked, &h.token).await;

    assert_eq!(first.codes[0].outcome, OwnerOutcome::CaughtUp);
    assert_eq!(second.codes[0].outcome, OwnerOutcome::CaughtUp);
    assert!(h.source.requests().await.is_empty());
    assert!(h.sink.charges().await.is_empty());
}

#[tokio::test]
async fn test_advances_past_expired_window() {
    let h = harness(at(2024, 7, 1));
    h.source.push_candidate(
        GLN,
        "CD",
        Ok(vec![tariff_record(
            "CD",
            "2024-06-01T00:00:00",
            Some("2024-09-01T00:00:00"),
        )]),
    );
    let mut owner = state(&["CD"], window(at(2024, 1, 1), Some(at(2024, 6, 1)), true));

    let report = h.reconciler.reconcile(&mut owner, &h.token).await;

    assert_eq!(report.codes[0].outcome, OwnerOutcome::CaughtUp);
    let requests = h.source.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].sort, SortDirection::Descending);
    assert_eq!(requests[0].date, Some(day(2024, 6, 1)));

    assert_eq!(owner.window.valid_from, Some(at(2024, 6, 1)));
    assert_eq!(owner.window.valid_to, Some(at(2024, 9, 1)));
    assert_eq!(h.sink.charges().await.len(), 1);
}

#[tokio::test]
async fn test_chain_of_windows_until_upstream_runs_dry() {
    let h = harness(at(2024, 12, 1));
    h.source.push_candidate(
        GLN,
        "CD",
        Ok(vec![tariff_record(
            "CD",
            "2024-01-01T00:00:00",
            Some("2024-04-01T00:00:00"),
        )]),
    );
    h.source.push_candidate(
        GLN,
        "CD",
        Ok(vec![tariff_record(
            "CD",
            "2024-04-01T00:00:00",
            Some("2024-10-01T00:00:00"),
        )]),
    );
    let mut owner = state(&["CD"], window(at(2023, 1, 1), Some(at(2024, 1, 1)), true));

    let report = h.reconciler.reconcile(&mut owner, &h.token).await;

    assert_eq!(report.codes[0].outcome, OwnerOutcome::NoFurtherData);
    assert_eq!(report.inserted(), 2);
    let dates: Vec<_> = h.source.requests().await.into_iter().map(|r| r.date).collect();
    assert_eq!(
        dates,
        vec![
            Some(day(2024, 1, 1)),
            Some(day(2024, 4, 1)),
            Some(day(2024, 10, 1))
        ]
    );
    assert_eq!(owner.window.valid_to, Some(at(2024, 10, 1)));
}

#[tokio::test]
async fn test_open_window_unchanged_stays_unchecked() {
    let h = harness(at(2024, 7, 1));
    h.source.push_candidate(
        GLN,
        "CD",
        Ok(vec![tariff_record("CD", "2024-01-01T00:00:00", None)]),
    );
    let mut owner = state(&["CD"], window(at(2024, 1, 1), None, false));

    let report = h.reconciler.reconcile(&mut owner, &h.token).await;

    assert_eq!(report.codes[0].outcome, OwnerOutcome::CaughtUp);
    assert_eq!(report.inserted(), 0);
    assert!(!owner.window.is_checked);
    let requests = h.source.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].sort, SortDirection::Descending);
    assert_eq!(requests[0].date, Some(far_future().date()));
}

#[tokio::test]
async fn test_open_window_with_empty_probe_is_caught_up() {
    let h = harness(at(2024, 7, 1));
    let start = window(at(2024, 1, 1), None, false);
    let mut owner = state(&["CD"], start.clone());

    let report = h.reconciler.reconcile(&mut owner, &h.token).await;

    assert_eq!(report.codes[0].outcome, OwnerOutcome::CaughtUp);
    assert_eq!(report.inserted(), 0);
    assert_eq!(owner.window, start);
    assert!(!owner.window.is_checked);
    assert!(h.sink.charges().await.is_empty());
    let requests = h.source.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].date, Some(far_future().date()));
}

#[tokio::test]
async fn test_open_window_replaced_by_newer_one() {
    let h = harness(at(2024, 7, 1));
    h.source.push_candidate(
        GLN,
        "CD",
        Ok(vec![tariff_record("CD", "2024-05-01T00:00:00", None)]),
    );
    let mut owner = state(&["CD"], window(at(2024, 1, 1), None, false));

    let report = h.reconciler.reconcile(&mut owner, &h.token).await;

    assert_eq!(report.codes[0].outcome, OwnerOutcome::CaughtUp);
    assert_eq!(report.inserted(), 1);
    assert_eq!(owner.window.valid_from, Some(at(2024, 5, 1)));
    assert!(owner.window.is_checked);
    assert_eq!(h.source.requests().await.len(), 1);
}

#[tokio::test]
async fn test_window_without_forward_progress_stops() {
    let h = harness(at(2024, 7, 1));
    h.source.push_candidate(
        GLN,
        "CD",
        Ok(vec![tariff_record(
            "CD",
            "2024-03-01T00:00:00",
            Some("2024-06-01T00:00:00"),
        )]),
    );
    let start = window(at(2024, 3, 1), Some(at(2024, 6, 1)), true);
    let mut owner = state(&["CD"], start.clone());

    let report = h.reconciler.reconcile(&mut owner, &h.token).await;

    assert_eq!(report.codes[0].outcome, OwnerOutcome::NoProgress);
    assert_eq!(owner.window, start);
    assert!(h.sink.charges().await.is_empty());
}

#[tokio::test]
async fn test_fetch_failure_is_isolated() {
    let h = harness(at(2024, 7, 1));
    let failure = UpstreamError::RetryExhausted {
        attempts: 10,
        last: "HTTP 503".to_string(),
    };
    h.source.push_candidate(GLN, "CD", Err(failure.clone()));
    let start = window(at(2024, 1, 1), Some(at(2024, 6, 1)), true);
    let mut owner = state(&["CD"], start.clone());

    let report = h.reconciler.reconcile(&mut owner, &h.token).await;

    assert_eq!(report.codes[0].outcome, OwnerOutcome::FetchFailed(failure));
    assert_eq!(owner.window, start);
}

#[tokio::test]
async fn test_malformed_candidate_stops_owner() {
    let h = harness(at(2024, 7, 1));
    let mut fields = tariff_record("CD", "2024-06-01T00:00:00", None)
        .fields()
        .clone();
    fields.remove("Description");
    h.source
        .push_candidate(GLN, "CD", Ok(vec![RawTariffRecord::new(fields)]));
    let mut owner = state(&["CD"], window(at(2024, 1, 1), Some(at(2024, 6, 1)), true));

    let report = h.reconciler.reconcile(&mut owner, &h.token).await;

    assert_eq!(report.codes[0].outcome, OwnerOutcome::Malformed);
    assert!(h.sink.charges().await.is_empty());
    assert_eq!(h.source.requests().await.len(), 1);
}

#[tokio::test]
async fn test_each_code_runs_from_loaded_window() {
    let h = harness(at(2024, 7, 1));
    h.source.push_candidate(
        GLN,
        "CD",
        Ok(vec![tariff_record(
            "CD",
            "2024-01-01T00:00:00",
            Some("2024-05-01T00:00:00"),
        )]),
    );
    h.source.push_candidate(
        GLN,
        "CD R",
        Ok(vec![tariff_record("CD R", "2024-02-01T00:00:00", None)]),
    );
    let mut owner = state(&["CD", "CD R"], ChargeWindow::default());

    let report = h.reconciler.reconcile(&mut owner, &h.token).await;

    assert_eq!(report.codes.len(), 2);
    assert_eq!(report.codes[0].charge_type_code, "CD");
    assert_eq!(report.codes[0].outcome, OwnerOutcome::NoFurtherData);
    assert_eq!(report.codes[1].outcome, OwnerOutcome::CaughtUp);

    // both codes bootstrapped from scratch
    let requests = h.source.requests().await;
    let ascending: Vec<_> = requests
        .iter()
        .filter(|r| r.sort == SortDirection::Ascending)
        .map(|r| r.charge_type_code.as_str())
        .collect();
    assert_eq!(ascending, vec!["CD", "CD R"]);

    assert_eq!(owner.window.valid_from, Some(at(2024, 2, 1)));
    assert_eq!(owner.window.valid_to, Some(far_future()));
    assert_eq!(h.sink.charges().await.len(), 2);
}

#[tokio::test]
async fn test_failed_write_still_advances() {
    let h = harness(at(2024, 7, 1));
    h.sink.fail_writes(true);
    h.source.push_candidate(
        GLN,
        "CD",
        Ok(vec![tariff_record("CD", "2024-01-01T00:00:00", None)]),
    );
    let mut owner = state(&["CD"], ChargeWindow::default());

    let report = h.reconciler.reconcile(&mut owner, &h.token).await;

    assert_eq!(report.inserted(), 0);
    assert_eq!(report.failed_writes(), 1);
    assert_eq!(owner.window.valid_from, Some(at(2024, 1, 1)));
    assert!(owner.window.is_checked);
}
