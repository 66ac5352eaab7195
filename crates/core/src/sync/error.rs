use crate::store::error::StoreError;
use thiserror::Error;

/// # Summary
/// Conditions that abort a whole sync pass.
///
/// # Invariants
/// - Per-owner and per-date failures never surface here; they are reported
///   through the pass outcome instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Login failed: {0}")]
    AuthFailure(#[source] StoreError),
    #[error("Watermark unavailable: {0}")]
    WatermarkUnavailable(#[source] StoreError),
    #[error("Charge owners unavailable: {0}")]
    OwnerDirectory(#[source] StoreError),
}
