use crate::common::time::parse_timestamp;
use crate::common::{far_future, time::lenient_opt};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Number of hourly price slots on a tariff record.
pub const HOURS: usize = 24;

/// GLN of the national grid operator that publishes tax and system tariffs.
pub const SYSTEM_OPERATOR_GLN: &str = "5790000432752";

/// Upstream price list field names.
pub mod field {
    pub const VALID_FROM: &str = "ValidFrom";
    pub const VALID_TO: &str = "ValidTo";
    pub const NOTE: &str = "Note";
    pub const DESCRIPTION: &str = "Description";
    pub const CHARGE_TYPE: &str = "ChargeType";
    pub const CHARGE_TYPE_CODE: &str = "ChargeTypeCode";
    pub const GLN_NUMBER: &str = "GLN_Number";
    pub const PRICE_PREFIX: &str = "Price";
}

/// # Summary
/// One record from the upstream price list, kept as the loosely typed JSON
/// object the API returns.
///
/// # Invariants
/// - Nothing is validated at this stage; records are frequently incomplete.
///   The normalizer decides what is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTariffRecord(Map<String, Value>);

impl RawTariffRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Non-null string value of `key`.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn note(&self) -> Option<&str> {
        self.text(field::NOTE)
    }

    pub fn valid_from(&self) -> Option<NaiveDateTime> {
        self.text(field::VALID_FROM).and_then(parse_timestamp)
    }

    pub fn valid_to(&self) -> Option<NaiveDateTime> {
        self.text(field::VALID_TO).and_then(parse_timestamp)
    }

    /// Hourly price `PriceN` (1-indexed, as upstream numbers them).
    pub fn price(&self, hour: usize) -> Option<Decimal> {
        self.0
            .get(&format!("{}{}", field::PRICE_PREFIX, hour))
            .and_then(decimal_value)
    }

    /// # Summary
    /// Whether this record is in force on `check_date`.
    ///
    /// # Logic
    /// Compares the date portion only:
    /// `date(ValidFrom) <= check_date` and (`ValidTo` is null or
    /// `date(ValidTo) > check_date`). A record without a parseable
    /// `ValidFrom` never applies.
    pub fn applies_on(&self, check_date: NaiveDate) -> bool {
        let Some(from) = self.valid_from() else {
            return false;
        };
        if from.date() > check_date {
            return false;
        }
        match self.get(field::VALID_TO) {
            None | Some(Value::Null) => true,
            Some(_) => self.valid_to().is_some_and(|to| to.date() > check_date),
        }
    }
}

impl From<Map<String, Value>> for RawTariffRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Numeric JSON value (or numeric string) as an exact decimal.
pub fn decimal_value(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Sort order of an upstream query on `ValidFrom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    // oldest first, used when bootstrapping an owner
    Ascending,
    // newest first, used when probing from a known date
    Descending,
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "asc"),
            SortDirection::Descending => write!(f, "desc"),
        }
    }
}

/// # Summary
/// Canonical owner tariff with 0-indexed hourly prices.
///
/// # Invariants
/// - All 24 prices and the metadata fields are present; only the normalizer
///   builds this type from upstream data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTariffRecord {
    pub charge_type: String,
    pub charge_type_code: String,
    pub note: String,
    pub description: String,
    pub valid_from: NaiveDateTime,
    #[serde(with = "lenient_opt")]
    pub valid_to: Option<NaiveDateTime>,
    pub prices: [Decimal; HOURS],
}

impl NormalizedTariffRecord {
    /// End of the window with the sentinel substituted for open-ended records.
    pub fn valid_to_or_sentinel(&self) -> NaiveDateTime {
        self.valid_to.unwrap_or_else(far_future)
    }
}

/// The three national price components published by the grid operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemTariffCategory {
    // "Elafgift"
    Tax,
    // "Systemtarif"
    SystemSurcharge,
    // "Transmissions nettarif"
    GridSurcharge,
}

impl SystemTariffCategory {
    pub const ALL: [SystemTariffCategory; 3] = [
        SystemTariffCategory::Tax,
        SystemTariffCategory::SystemSurcharge,
        SystemTariffCategory::GridSurcharge,
    ];

    /// Upstream `Note` label.
    pub fn note(&self) -> &'static str {
        match self {
            SystemTariffCategory::Tax => "Elafgift",
            SystemTariffCategory::SystemSurcharge => "Systemtarif",
            SystemTariffCategory::GridSurcharge => "Transmissions nettarif",
        }
    }

    pub fn from_note(note: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.note() == note)
    }
}

impl std::fmt::Display for SystemTariffCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.note())
    }
}

/// # Summary
/// Single-price record of one system tariff category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemTariffRecord {
    pub category: SystemTariffCategory,
    pub valid_from: NaiveDateTime,
    pub valid_to: Option<NaiveDateTime>,
    pub price: Decimal,
}

impl SystemTariffRecord {
    /// # Summary
    /// Reads a raw record as a system tariff.
    ///
    /// # Returns
    /// `None` unless the note is a recognized category and `ValidFrom` and
    /// `Price1` parse.
    pub fn from_raw(raw: &RawTariffRecord) -> Option<Self> {
        Some(Self {
            category: raw.note().and_then(SystemTariffCategory::from_note)?,
            valid_from: raw.valid_from()?,
            valid_to: raw.valid_to(),
            price: raw.price(1)?,
        })
    }
}

/// Electricity tax, always excluding VAT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    pub valid_from: NaiveDateTime,
    pub valid_to: NaiveDateTime,
    pub amount: Decimal,
    pub including_vat: bool,
}

/// # Summary
/// Grid surcharge and system surcharge sharing one validity window.
///
/// # Invariants
/// - The window is the grid surcharge record's window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedTariff {
    pub valid_from: NaiveDateTime,
    pub valid_to: NaiveDateTime,
    pub net_tariff: Decimal,
    pub system_tariff: Decimal,
    pub including_vat: bool,
}
