use rust_decimal::Decimal;
use serde_json::Value;
use tarifsync_core::tariff::entity::{HOURS, NormalizedTariffRecord, RawTariffRecord, field};
use tracing::debug;

/// # Summary
/// Turns an upstream record into the canonical 24-slot shape.
///
/// # Logic
/// 1. Slot `i` takes `Price{i+1}`, or `Price1` when that hour is null.
/// 2. `ValidFrom`, `Note`, `Description`, `ChargeType` and `ChargeTypeCode`
///    must carry a value; the `ValidTo` key must exist but may be null.
/// 3. Anything short of all 24 slots and the six metadata fields is dropped.
///
/// # Returns
/// `None` for a record that is not usable; the reason is logged at debug.
pub fn normalize(raw: &RawTariffRecord) -> Option<NormalizedTariffRecord> {
    match build(raw) {
        Ok(record) => Some(record),
        Err(reason) => {
            debug!(
                "Rejected tariff record {:?} from {:?}: {}",
                raw.text(field::CHARGE_TYPE_CODE),
                raw.text(field::VALID_FROM),
                reason
            );
            None
        }
    }
}

fn build(raw: &RawTariffRecord) -> Result<NormalizedTariffRecord, &'static str> {
    let valid_from = raw.valid_from().ok_or("ValidFrom missing or unreadable")?;
    let valid_to = match raw.get(field::VALID_TO) {
        None => return Err("ValidTo key missing"),
        Some(Value::Null) => None,
        Some(_) => Some(raw.valid_to().ok_or("ValidTo unreadable")?),
    };
    let required = |key: &str| raw.text(key).map(str::to_string);

    Ok(NormalizedTariffRecord {
        charge_type: required(field::CHARGE_TYPE).ok_or("ChargeType missing")?,
        charge_type_code: required(field::CHARGE_TYPE_CODE).ok_or("ChargeTypeCode missing")?,
        note: required(field::NOTE).ok_or("Note missing")?,
        description: required(field::DESCRIPTION).ok_or("Description missing")?,
        valid_from,
        valid_to,
        prices: hourly_prices(raw).ok_or("hourly price missing without base price")?,
    })
}

fn hourly_prices(raw: &RawTariffRecord) -> Option<[Decimal; HOURS]> {
    let base = raw.price(1);
    let mut prices = [Decimal::ZERO; HOURS];
    for (slot, price) in prices.iter_mut().enumerate() {
        *price = raw.price(slot + 1).or(base)?;
    }
    Some(prices)
}
