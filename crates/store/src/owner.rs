use crate::client::{DownstreamApi, read_json, send};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tarifsync_core::common::AccessToken;
use tarifsync_core::common::time::lenient_opt;
use tarifsync_core::store::error::StoreError;
use tarifsync_core::store::port::OwnerDirectory;
use tarifsync_core::sync::entity::{ChargeOwner, ChargeOwnerState, ChargeWindow};
use tracing::{debug, info};

/// Row of `/chargeowner/with-latest-charge`.
#[derive(Deserialize, Debug)]
struct OwnerRow {
    id: i64,
    glnnumber: String,
    #[serde(default)]
    compagny: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    chargetype: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    chargetypecode: Vec<String>,
    #[serde(default, with = "lenient_opt")]
    valid_from: Option<NaiveDateTime>,
    #[serde(default, with = "lenient_opt")]
    valid_to: Option<NaiveDateTime>,
    #[serde(default)]
    is_checked: Option<bool>,
}

impl From<OwnerRow> for ChargeOwnerState {
    fn from(row: OwnerRow) -> Self {
        ChargeOwnerState {
            owner: ChargeOwner {
                id: row.id,
                gln_number: row.glnnumber,
                company: row.compagny.unwrap_or_default(),
                charge_types: row.chargetype,
                charge_type_codes: row.chargetypecode,
            },
            window: ChargeWindow {
                valid_from: row.valid_from,
                valid_to: row.valid_to,
                is_checked: row.is_checked.unwrap_or(false),
            },
        }
    }
}

/// # Summary
/// Reads a list of codes the store may send in several shapes.
///
/// # Logic
/// 1. `null` → empty list.
/// 2. JSON array of strings → as is.
/// 3. Text such as `"['D03', 'D02']"` or `"[\"D03\"]"` → split on commas,
///    quotes and brackets stripped.
/// 4. Any other non-empty text → a single code.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(serde::de::Error::custom(format!(
                    "expected string in code list, got {}",
                    other
                ))),
            })
            .collect(),
        Value::String(text) => Ok(parse_code_list(&text)),
        other => Err(serde::de::Error::custom(format!(
            "expected code list, got {}",
            other
        ))),
    }
}

pub(crate) fn parse_code_list(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);
    inner
        .split(',')
        .map(|part| part.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl OwnerDirectory for DownstreamApi {
    async fn charge_owners_with_last_charge(
        &self,
        token: &AccessToken,
    ) -> Result<Vec<ChargeOwnerState>, StoreError> {
        let resp = send(self.get("/chargeowner/with-latest-charge", token)).await?;
        let rows: Vec<OwnerRow> = read_json(resp).await?;

        let owners: Vec<ChargeOwnerState> = rows
            .into_iter()
            .inspect(|row| debug!("Loaded charge owner: {:?}", row))
            .map(ChargeOwnerState::from)
            .collect();
        info!("Loaded {} charge owners", owners.len());
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_code_list_shapes() {
        assert_eq!(parse_code_list("['D03']"), vec!["D03"]);
        assert_eq!(parse_code_list("['DT_C_01', 'DT_C_02']"), vec!["DT_C_01", "DT_C_02"]);
        assert_eq!(parse_code_list(r#"["CD","CD R"]"#), vec!["CD", "CD R"]);
        assert_eq!(parse_code_list("D03"), vec!["D03"]);
        assert!(parse_code_list("[]").is_empty());
        assert!(parse_code_list("  ").is_empty());
    }

    #[test]
    fn test_owner_row_to_state() {
        let row: OwnerRow = serde_json::from_value(json!({
            "id": 12,
            "glnnumber": "5790000610877",
            "compagny": "Radius Elnet A/S",
            "chargetype": "['D03']",
            "chargetypecode": ["DT_C_01"],
            "valid_from": "2024-01-01T00:00:00",
            "valid_to": "9999-12-31T23:59:59",
            "is_checked": true
        }))
        .unwrap();
        let state = ChargeOwnerState::from(row);

        assert_eq!(state.owner.id, 12);
        assert_eq!(state.owner.charge_types, vec!["D03"]);
        assert_eq!(state.owner.charge_type_codes, vec!["DT_C_01"]);
        assert!(state.window.valid_from.is_some());
        assert!(state.window.is_checked);
    }

    #[test]
    fn test_owner_row_without_charge() {
        let row: OwnerRow = serde_json::from_value(json!({
            "id": 3,
            "glnnumber": "5790001089030",
            "compagny": null,
            "chargetype": null,
            "chargetypecode": "['CD']",
            "valid_from": null,
            "valid_to": null
        }))
        .unwrap();
        let state = ChargeOwnerState::from(row);

        assert_eq!(state.owner.company, "");
        assert!(state.owner.charge_types.is_empty());
        assert_eq!(state.window, ChargeWindow::default());
    }
}
