//! Wire shapes of the downstream API.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tarifsync_core::common::far_future;
use tarifsync_core::common::time::lenient_opt;
use tarifsync_core::store::error::StoreError;
use tarifsync_core::sync::entity::ChargeOwner;
use tarifsync_core::tariff::entity::{CombinedTariff, NormalizedTariffRecord, Tax};

fn iso(value: NaiveDateTime) -> String {
    value.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// # Summary
/// Body of `POST /charge`.
///
/// # Invariants
/// - Prices go out as `price1`..`price24`, slot `i` of the record as `price{i+1}`.
/// - An open-ended record is sent with the sentinel `valid_to`.
pub struct ChargePayload<'a> {
    pub owner: &'a ChargeOwner,
    pub record: &'a NormalizedTariffRecord,
}

impl Serialize for ChargePayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let record = self.record;
        let mut map = serializer.serialize_map(Some(7 + record.prices.len()))?;
        map.serialize_entry("chargeowner_id", &self.owner.id)?;
        map.serialize_entry("charge_type", &record.charge_type)?;
        map.serialize_entry("charge_type_code", &record.charge_type_code)?;
        map.serialize_entry("note", &record.note)?;
        map.serialize_entry("description", &record.description)?;
        map.serialize_entry("valid_from", &iso(record.valid_from))?;
        map.serialize_entry("valid_to", &iso(record.valid_to_or_sentinel()))?;
        for (slot, price) in record.prices.iter().enumerate() {
            map.serialize_entry(&format!("price{}", slot + 1), price)?;
        }
        map.end()
    }
}

/// Body of `POST /tax` and response of `GET /tax/latest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxPayload {
    #[serde(default, with = "lenient_opt")]
    pub valid_from: Option<NaiveDateTime>,
    #[serde(default, with = "lenient_opt")]
    pub valid_to: Option<NaiveDateTime>,
    #[serde(default)]
    pub taxammount: Option<Decimal>,
    #[serde(rename = "includingVAT", default)]
    pub including_vat: Option<bool>,
}

impl From<&Tax> for TaxPayload {
    fn from(tax: &Tax) -> Self {
        Self {
            valid_from: Some(tax.valid_from),
            valid_to: Some(tax.valid_to),
            taxammount: Some(tax.amount),
            including_vat: Some(tax.including_vat),
        }
    }
}

impl TryFrom<TaxPayload> for Tax {
    type Error = StoreError;

    fn try_from(payload: TaxPayload) -> Result<Self, Self::Error> {
        Ok(Tax {
            valid_from: payload
                .valid_from
                .ok_or_else(|| StoreError::Parse("tax without valid_from".into()))?,
            valid_to: payload.valid_to.unwrap_or_else(far_future),
            amount: payload.taxammount.unwrap_or_default(),
            including_vat: payload.including_vat.unwrap_or(false),
        })
    }
}

/// Body of `POST /tarif` and response of `GET /tarif/latest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TarifPayload {
    #[serde(default, with = "lenient_opt")]
    pub valid_from: Option<NaiveDateTime>,
    #[serde(default, with = "lenient_opt")]
    pub valid_to: Option<NaiveDateTime>,
    #[serde(default)]
    pub nettarif: Option<Decimal>,
    #[serde(default)]
    pub systemtarif: Option<Decimal>,
    #[serde(rename = "includingVAT", default)]
    pub including_vat: Option<bool>,
}

impl From<&CombinedTariff> for TarifPayload {
    fn from(tarif: &CombinedTariff) -> Self {
        Self {
            valid_from: Some(tarif.valid_from),
            valid_to: Some(tarif.valid_to),
            nettarif: Some(tarif.net_tariff),
            systemtarif: Some(tarif.system_tariff),
            including_vat: Some(tarif.including_vat),
        }
    }
}

impl TryFrom<TarifPayload> for CombinedTariff {
    type Error = StoreError;

    fn try_from(payload: TarifPayload) -> Result<Self, Self::Error> {
        Ok(CombinedTariff {
            valid_from: payload
                .valid_from
                .ok_or_else(|| StoreError::Parse("tarif without valid_from".into()))?,
            valid_to: payload.valid_to.unwrap_or_else(far_future),
            net_tariff: payload.nettarif.unwrap_or_default(),
            system_tariff: payload.systemtarif.unwrap_or_default(),
            including_vat: payload.including_vat.unwrap_or(false),
        })
    }
}
