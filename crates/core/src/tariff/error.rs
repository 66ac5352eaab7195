use super::entity::{SystemTariffCategory, Tax};
use thiserror::Error;

/// # Summary
/// Upstream query failures.
///
/// # Invariants
/// - An empty but successful payload is not an error; it is `Ok(vec![])`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
    // connection, TLS or timeout failure from the HTTP client
    #[error("Network error: {0}")]
    Network(String),
    // non-success HTTP status
    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    // body was not the expected `{"records": [...]}` shape
    #[error("Parse error: {0}")]
    Parse(String),
    // every attempt allowed by the retry policy failed
    #[error("Retry attempts exceeded after {attempts} tries: {last}")]
    RetryExhausted { attempts: u32, last: String },
}

impl UpstreamError {
    /// Network failures, 5xx and 429 are worth retrying; the rest are not.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Network(_) => true,
            UpstreamError::Status { status, .. } => *status >= 500 || *status == 429,
            UpstreamError::Parse(_) | UpstreamError::RetryExhausted { .. } => false,
        }
    }
}

/// # Summary
/// The system tariff batch for one window lacked a category.
///
/// # Invariants
/// - `missing` only ever names surcharge categories; a batch without a tax
///   record still merges.
/// - `tax` carries the batch's tax so it can be stored regardless.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("Incomplete system tariff batch, missing: {}", format_missing(.missing))]
    Incomplete {
        missing: Vec<SystemTariffCategory>,
        tax: Option<Tax>,
    },
}

fn format_missing(missing: &[SystemTariffCategory]) -> String {
    missing
        .iter()
        .map(|c| c.note())
        .collect::<Vec<_>>()
        .join(", ")
}
