use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tarifsync_core::common::time::FakeClockProvider;
use tarifsync_core::config::{RetryPolicy, UpstreamConfig};
use tarifsync_core::sync::entity::ChargeOwner;
use tarifsync_core::tariff::entity::{SortDirection, SystemTariffCategory};
use tarifsync_core::tariff::error::UpstreamError;
use tarifsync_core::tariff::port::TariffSource;
use tarifsync_core::test_utils::{system_record, tariff_record};
use tarifsync_feed::energidata::EnergiDataProvider;
use tokio::net::TcpListener;

/// # Summary
/// Scripted upstream: answers each request with the next queued status,
/// then with `200 {"records": body}` once the queue is empty.
#[derive(Clone)]
struct Upstream {
    statuses: Arc<Mutex<Vec<u16>>>,
    body: Arc<Value>,
    seen: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

async fn pricelist(
    State(upstream): State<Upstream>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    upstream.seen.lock().unwrap().push(params);
    let next = {
        let mut statuses = upstream.statuses.lock().unwrap();
        if statuses.is_empty() { None } else { Some(statuses.remove(0)) }
    };
    match next {
        Some(code) => (
            StatusCode::from_u16(code).unwrap(),
            Json(json!({ "error": "scripted" })),
        ),
        None => (
            StatusCode::OK,
            Json(json!({ "total": 0, "dataset": "DatahubPricelist", "records": *upstream.body })),
        ),
    }
}

// Starts the fake dataset on a random port.
async fn spawn_upstream(statuses: Vec<u16>, records: Value) -> (String, Upstream) {
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok();

    let upstream = Upstream {
        statuses: Arc::new(Mutex::new(statuses)),
        body: Arc::new(records),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/dataset/DatahubPricelist", get(pricelist))
        .with_state(upstream.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (
        format!("http://127.0.0.1:{}/dataset/DatahubPricelist", port),
        upstream,
    )
}

fn provider(base_url: String, attempts: u32) -> EnergiDataProvider {
    let config = UpstreamConfig {
        base_url,
        page_limit: 2500,
        system_page_limit: 500,
        timeout_secs: 5,
        retry: RetryPolicy::immediate(attempts),
    };
    let clock = Arc::new(FakeClockProvider::new(
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap(),
    ));
    EnergiDataProvider::new(&config, clock).unwrap()
}

fn owner() -> ChargeOwner {
    ChargeOwner {
        id: 1,
        gln_number: "5790000000000".into(),
        company: "Test Net A/S".into(),
        charge_types: vec!["D03".into()],
        charge_type_codes: vec!["CD".into()],
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_probe_keeps_records_in_force_on_date() {
    let records = json!([
        tariff_record("CD", "2024-09-01T00:00:00", None),
        tariff_record("CD", "2024-06-01T00:00:00", Some("2024-09-01T00:00:00")),
        tariff_record("CD", "2024-01-01T00:00:00", Some("2024-06-01T00:00:00")),
    ]);
    let (url, upstream) = spawn_upstream(vec![], records).await;

    let found = provider(url, 3)
        .fetch_candidate(&owner(), "CD", SortDirection::Descending, Some(day(2024, 6, 1)))
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].text("ValidFrom"), Some("2024-06-01T00:00:00"));

    let seen = upstream.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0]["filter"],
        r#"{"ChargeType":["D03"],"ChargeTypeCode":["CD"],"GLN_Number":["5790000000000"]}"#
    );
    assert_eq!(seen[0]["sort"], "ValidFrom desc");
    assert_eq!(seen[0]["limit"], "2500");
}

#[tokio::test]
async fn test_bootstrap_uses_first_record_date() {
    let records = json!([
        tariff_record("CD", "2021-01-01T00:00:00", Some("2022-01-01T00:00:00")),
        tariff_record("CD", "2022-01-01T00:00:00", None),
    ]);
    let (url, upstream) = spawn_upstream(vec![], records).await;

    let found = provider(url, 3)
        .fetch_candidate(&owner(), "CD", SortDirection::Ascending, None)
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].text("ValidFrom"), Some("2021-01-01T00:00:00"));
    assert_eq!(upstream.seen.lock().unwrap()[0]["sort"], "ValidFrom asc");
}

#[tokio::test]
async fn test_empty_payload_is_not_an_error() {
    let (url, _upstream) = spawn_upstream(vec![], json!([])).await;

    let found = provider(url, 3)
        .fetch_candidate(&owner(), "CD", SortDirection::Descending, Some(day(2024, 6, 1)))
        .await;

    assert_eq!(found, Ok(vec![]));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let records = json!([tariff_record("CD", "2024-06-01T00:00:00", None)]);
    let (url, upstream) = spawn_upstream(vec![503, 500], records).await;

    let found = provider(url, 5)
        .fetch_candidate(&owner(), "CD", SortDirection::Descending, None)
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(upstream.seen.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_retry_exhaustion() {
    let (url, upstream) = spawn_upstream(vec![500, 500, 500, 500], json!([])).await;

    let result = provider(url, 3)
        .fetch_candidate(&owner(), "CD", SortDirection::Descending, None)
        .await;

    assert!(matches!(
        result,
        Err(UpstreamError::RetryExhausted { attempts: 3, .. })
    ));
    assert_eq!(upstream.seen.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_bad_request_fails_without_retry() {
    let (url, upstream) = spawn_upstream(vec![400], json!([])).await;

    let result = provider(url, 5)
        .fetch_candidate(&owner(), "CD", SortDirection::Descending, None)
        .await;

    assert!(matches!(result, Err(UpstreamError::Status { status: 400, .. })));
    assert_eq!(upstream.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_system_tariffs_query() {
    let records = json!([
        system_record(SystemTariffCategory::Tax, "2024-01-01T00:00:00", None, 0.761),
        system_record(SystemTariffCategory::SystemSurcharge, "2024-01-01T00:00:00", None, 0.054),
        system_record(
            SystemTariffCategory::GridSurcharge,
            "2023-01-01T00:00:00",
            Some("2024-01-01T00:00:00"),
            0.058
        ),
        system_record(SystemTariffCategory::GridSurcharge, "2024-01-01T00:00:00", None, 0.074),
    ]);
    let (url, upstream) = spawn_upstream(vec![], records).await;

    let found = provider(url, 3)
        .fetch_system_tariffs(day(2024, 3, 1))
        .await
        .unwrap();

    assert_eq!(found.len(), 3);
    assert!(found.iter().all(|r| r.text("ValidFrom") == Some("2024-01-01T00:00:00")));

    let seen = upstream.seen.lock().unwrap();
    assert_eq!(
        seen[0]["filter"],
        r#"{"GLN_Number":["5790000432752"],"Note":["Elafgift","Systemtarif","Transmissions nettarif"]}"#
    );
    assert_eq!(seen[0]["limit"], "500");
    assert!(!seen[0].contains_key("sort"));
}
