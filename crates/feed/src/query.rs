use serde_json::Value;
use std::collections::BTreeMap;
use tarifsync_core::sync::entity::ChargeOwner;
use tarifsync_core::tariff::entity::{SYSTEM_OPERATOR_GLN, SortDirection, SystemTariffCategory, field};

/// # Summary
/// Typed query against the price list dataset.
///
/// # Invariants
/// - Every filter field maps to a list of accepted values; the JSON encoding
///   happens only in [`PricelistQuery::params`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricelistQuery {
    filter: BTreeMap<String, Vec<String>>,
    sort: Option<SortDirection>,
    limit: u32,
}

impl PricelistQuery {
    pub fn new(limit: u32) -> Self {
        Self {
            filter: BTreeMap::new(),
            sort: None,
            limit,
        }
    }

    /// # Summary
    /// Query for one owner's tariffs of one charge type code.
    ///
    /// # Logic
    /// Filters on the exact `ChargeTypeCode`, the owner's `GLN_Number` and all
    /// of its `ChargeType` values.
    pub fn for_owner(owner: &ChargeOwner, charge_type_code: &str, limit: u32) -> Self {
        Self::new(limit)
            .filter(field::CHARGE_TYPE_CODE, [charge_type_code])
            .filter(field::GLN_NUMBER, [owner.gln_number.as_str()])
            .filter(field::CHARGE_TYPE, owner.charge_types.iter().map(String::as_str))
    }

    /// Query for the three national tax and system tariff notes.
    pub fn system_tariffs(limit: u32) -> Self {
        Self::new(limit)
            .filter(
                field::NOTE,
                SystemTariffCategory::ALL.iter().map(|c| c.note()),
            )
            .filter(field::GLN_NUMBER, [SYSTEM_OPERATOR_GLN])
    }

    /// Adds (or replaces) the accepted values of `name`.
    pub fn filter<'a, I>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.filter.insert(
            name.to_string(),
            values.into_iter().map(str::to_string).collect(),
        );
        self
    }

    pub fn sort(mut self, direction: SortDirection) -> Self {
        self.sort = Some(direction);
        self
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Filter object as sent in the `filter` parameter.
    pub fn filter_json(&self) -> String {
        let object = self
            .filter
            .iter()
            .map(|(name, values)| {
                (
                    name.clone(),
                    Value::Array(values.iter().cloned().map(Value::String).collect()),
                )
            })
            .collect();
        Value::Object(object).to_string()
    }

    /// # Summary
    /// URL query parameters, ready for `reqwest::RequestBuilder::query`.
    ///
    /// # Returns
    /// `filter`, then `sort` when set, then `limit`.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("filter", self.filter_json())];
        if let Some(direction) = self.sort {
            params.push(("sort", format!("{} {}", field::VALID_FROM, direction)));
        }
        params.push(("limit", self.limit.to_string()));
        params
    }
}
