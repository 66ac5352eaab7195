use std::collections::HashMap;
use tarifsync_core::common::far_future;
use tarifsync_core::tariff::entity::{
    CombinedTariff, RawTariffRecord, SystemTariffCategory, SystemTariffRecord, Tax,
};
use tarifsync_core::tariff::error::MergeError;
use tracing::debug;

/// Tax and combined tariff built from one system tariff batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedSystemTariffs {
    pub tax: Option<Tax>,
    pub tariff: CombinedTariff,
}

/// # Summary
/// Combines the national tax and surcharge records in force on one date.
///
/// # Logic
/// 1. Partition by note; the first record of each category wins.
/// 2. `Elafgift` becomes a standalone `Tax`.
/// 3. `Transmissions nettarif` and `Systemtarif` become one `CombinedTariff`
///    over the grid surcharge window.
/// 4. Open-ended windows get the sentinel end; VAT is never included.
///
/// # Returns
/// `MergeError::Incomplete` when a surcharge is missing. The error still
/// carries the batch's tax, if any.
pub fn merge(records: &[RawTariffRecord]) -> Result<MergedSystemTariffs, MergeError> {
    let mut by_category: HashMap<SystemTariffCategory, SystemTariffRecord> = HashMap::new();
    for raw in records {
        match SystemTariffRecord::from_raw(raw) {
            Some(record) => {
                by_category.entry(record.category).or_insert(record);
            }
            None => debug!("Skipping system tariff record {:?}", raw.note()),
        }
    }

    let tax = by_category
        .get(&SystemTariffCategory::Tax)
        .map(|record| Tax {
            valid_from: record.valid_from,
            valid_to: record.valid_to.unwrap_or_else(far_future),
            amount: record.price,
            including_vat: false,
        });

    let grid = by_category.get(&SystemTariffCategory::GridSurcharge);
    let system = by_category.get(&SystemTariffCategory::SystemSurcharge);
    match (grid, system) {
        (Some(grid), Some(system)) => Ok(MergedSystemTariffs {
            tax,
            tariff: CombinedTariff {
                valid_from: grid.valid_from,
                valid_to: grid.valid_to.unwrap_or_else(far_future),
                net_tariff: grid.price,
                system_tariff: system.price,
                including_vat: false,
            },
        }),
        _ => {
            let missing = [
                SystemTariffCategory::SystemSurcharge,
                SystemTariffCategory::GridSurcharge,
            ]
            .into_iter()
            .filter(|c| !by_category.contains_key(c))
            .collect();
            Err(MergeError::Incomplete { missing, tax })
        }
    }
}
