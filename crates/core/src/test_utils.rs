//! In-memory doubles for the ports, enabled with the `test-utils` feature.

use crate::common::AccessToken;
use crate::store::error::StoreError;
use crate::store::port::{AuthProvider, OwnerDirectory, PersistenceSink, WatermarkSource};
use crate::sync::entity::{ChargeOwner, ChargeOwnerState, Watermark};
use crate::tariff::entity::{
    CombinedTariff, NormalizedTariffRecord, RawTariffRecord, SortDirection, SystemTariffCategory,
    Tax,
};
use crate::tariff::error::UpstreamError;
use crate::tariff::port::TariffSource;
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

type Scripted = VecDeque<Result<Vec<RawTariffRecord>, UpstreamError>>;

/// A `fetch_candidate` call as the source saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRequest {
    pub gln_number: String,
    pub charge_type_code: String,
    pub sort: SortDirection,
    pub date: Option<NaiveDate>,
}

/// # Summary
/// Upstream double answering from per-(GLN, code) queues.
///
/// # Invariants
/// - An exhausted queue answers `Ok(vec![])`, i.e. "no more data".
#[derive(Default)]
pub struct ScriptedTariffSource {
    candidates: DashMap<(String, String), Scripted>,
    system: Mutex<Scripted>,
    requests: Mutex<Vec<CandidateRequest>>,
    system_requests: Mutex<Vec<NaiveDate>>,
}

impl ScriptedTariffSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the answer to the next `fetch_candidate` for `gln`/`code`.
    pub fn push_candidate(
        &self,
        gln: &str,
        code: &str,
        response: Result<Vec<RawTariffRecord>, UpstreamError>,
    ) {
        self.candidates
            .entry((gln.to_string(), code.to_string()))
            .or_default()
            .push_back(response);
    }

    pub async fn push_system(&self, response: Result<Vec<RawTariffRecord>, UpstreamError>) {
        self.system.lock().await.push_back(response);
    }

    pub async fn requests(&self) -> Vec<CandidateRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn system_requests(&self) -> Vec<NaiveDate> {
        self.system_requests.lock().await.clone()
    }
}

#[async_trait]
impl TariffSource for ScriptedTariffSource {
    async fn fetch_candidate(
        &self,
        owner: &ChargeOwner,
        charge_type_code: &str,
        sort: SortDirection,
        date: Option<NaiveDate>,
    ) -> Result<Vec<RawTariffRecord>, UpstreamError> {
        self.requests.lock().await.push(CandidateRequest {
            gln_number: owner.gln_number.clone(),
            charge_type_code: charge_type_code.to_string(),
            sort,
            date,
        });
        self.candidates
            .get_mut(&(owner.gln_number.clone(), charge_type_code.to_string()))
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_system_tariffs(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<RawTariffRecord>, UpstreamError> {
        self.system_requests.lock().await.push(date);
        self.system
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// # Summary
/// Sink double that keeps every write in memory.
///
/// # Invariants
/// - `latest_*` answer with the stored entry that has the newest `valid_from`,
///   so seeded and inserted rows behave alike.
#[derive(Default)]
pub struct MemorySink {
    charges: Mutex<Vec<(i64, NormalizedTariffRecord)>>,
    taxes: Mutex<Vec<Tax>>,
    tarifs: Mutex<Vec<CombinedTariff>>,
    fail_writes: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-existing tax row, not counted as a write by the run.
    pub async fn seed_tax(&self, tax: Tax) {
        self.taxes.lock().await.push(tax);
    }

    pub async fn seed_tarif(&self, tarif: CombinedTariff) {
        self.tarifs.lock().await.push(tarif);
    }

    /// Makes every later insert answer HTTP 500.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn charges(&self) -> Vec<(i64, NormalizedTariffRecord)> {
        self.charges.lock().await.clone()
    }

    pub async fn taxes(&self) -> Vec<Tax> {
        self.taxes.lock().await.clone()
    }

    pub async fn tarifs(&self) -> Vec<CombinedTariff> {
        self.tarifs.lock().await.clone()
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                status: 500,
                body: "write rejected".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn insert_charge(
        &self,
        record: &NormalizedTariffRecord,
        owner: &ChargeOwner,
        _token: &AccessToken,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        self.charges.lock().await.push((owner.id, record.clone()));
        Ok(())
    }

    async fn insert_tax(&self, _token: &AccessToken, tax: &Tax) -> Result<(), StoreError> {
        self.check_write()?;
        self.taxes.lock().await.push(tax.clone());
        Ok(())
    }

    async fn insert_tarif(
        &self,
        _token: &AccessToken,
        tarif: &CombinedTariff,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        self.tarifs.lock().await.push(tarif.clone());
        Ok(())
    }

    async fn latest_tax(&self, _token: &AccessToken) -> Result<Option<Tax>, StoreError> {
        Ok(self
            .taxes
            .lock()
            .await
            .iter()
            .max_by_key(|t| t.valid_from)
            .cloned())
    }

    async fn latest_tarif(
        &self,
        _token: &AccessToken,
    ) -> Result<Option<CombinedTariff>, StoreError> {
        Ok(self
            .tarifs
            .lock()
            .await
            .iter()
            .max_by_key(|t| t.valid_from)
            .cloned())
    }
}

/// Login, watermark and owner directory double with fixed answers.
pub struct StaticDownstream {
    pub token: Option<String>,
    pub watermark: Option<Watermark>,
    pub owners: Option<Vec<ChargeOwnerState>>,
}

impl StaticDownstream {
    pub fn new(owners: Vec<ChargeOwnerState>) -> Self {
        Self {
            token: Some("test-token".to_string()),
            watermark: Some(Watermark::default()),
            owners: Some(owners),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticDownstream {
    async fn login(&self) -> Result<AccessToken, StoreError> {
        self.token
            .clone()
            .map(AccessToken::new)
            .ok_or_else(|| StoreError::Unauthorized("bad credentials".to_string()))
    }
}

#[async_trait]
impl WatermarkSource for StaticDownstream {
    async fn watermark(&self, _token: &AccessToken) -> Result<Watermark, StoreError> {
        self.watermark.clone().ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl OwnerDirectory for StaticDownstream {
    async fn charge_owners_with_last_charge(
        &self,
        _token: &AccessToken,
    ) -> Result<Vec<ChargeOwnerState>, StoreError> {
        self.owners.clone().ok_or(StoreError::NotFound)
    }
}

/// # Summary
/// Complete upstream tariff record with `Price{h}` = `h / 100`.
///
/// # Arguments
/// * `code`: `ChargeTypeCode`.
/// * `valid_from`: `ValidFrom` text.
/// * `valid_to`: `ValidTo` text, `None` for an open-ended record.
pub fn tariff_record(code: &str, valid_from: &str, valid_to: Option<&str>) -> RawTariffRecord {
    let mut fields = Map::new();
    fields.insert("ChargeOwner".into(), json!("Test Net A/S"));
    fields.insert("GLN_Number".into(), json!("5790000000000"));
    fields.insert("ChargeType".into(), json!("D03"));
    fields.insert("ChargeTypeCode".into(), json!(code));
    fields.insert("Note".into(), json!("Nettarif C"));
    fields.insert("Description".into(), json!("Nettarif C time"));
    fields.insert("ValidFrom".into(), json!(valid_from));
    fields.insert(
        "ValidTo".into(),
        valid_to.map_or(Value::Null, |to| json!(to)),
    );
    fields.insert("VATClass".into(), json!("D02"));
    for hour in 1..=24u32 {
        fields.insert(format!("Price{}", hour), json!(f64::from(hour) / 100.0));
    }
    RawTariffRecord::new(fields)
}

/// Upstream system tariff record for `category` with a single `Price1`.
pub fn system_record(
    category: SystemTariffCategory,
    valid_from: &str,
    valid_to: Option<&str>,
    price: f64,
) -> RawTariffRecord {
    let mut fields = Map::new();
    fields.insert("GLN_Number".into(), json!("5790000432752"));
    fields.insert("ChargeType".into(), json!("D03"));
    fields.insert("ChargeTypeCode".into(), json!("40000"));
    fields.insert("Note".into(), json!(category.note()));
    fields.insert("Description".into(), json!(category.note()));
    fields.insert("ValidFrom".into(), json!(valid_from));
    fields.insert(
        "ValidTo".into(),
        valid_to.map_or(Value::Null, |to| json!(to)),
    );
    fields.insert("Price1".into(), json!(price));
    for hour in 2..=24u32 {
        fields.insert(format!("Price{}", hour), Value::Null);
    }
    RawTariffRecord::new(fields)
}
