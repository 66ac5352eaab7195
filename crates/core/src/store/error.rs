use thiserror::Error;

/// # Summary
/// Downstream API failures.
///
/// # Invariants
/// - Must derive `Error` through `thiserror`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Connection or timeout failure
    #[error("Network error: {0}")]
    Network(String),
    /// Credentials rejected or token expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Any other non-success status
    #[error("Store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// Response body did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
    /// Record not found
    #[error("Not found")]
    NotFound,
}
