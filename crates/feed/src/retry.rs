use std::future::Future;
use tarifsync_core::config::RetryPolicy;
use tarifsync_core::tariff::error::UpstreamError;
use tracing::{debug, warn};

/// # Summary
/// Runs `op` until it succeeds, fails permanently, or the policy runs out.
///
/// # Logic
/// 1. Call `op`; success is returned as is.
/// 2. A transient error (see [`UpstreamError::is_transient`]) waits
///    `policy.delay_for(n)` and tries again.
/// 3. A permanent error is returned immediately.
/// 4. After `policy.attempts()` transient failures the call ends in
///    `UpstreamError::RetryExhausted` carrying the last error.
///
/// # Arguments
/// * `policy`: attempt count and backoff.
/// * `what`: label for log lines.
/// * `op`: produces one attempt.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let attempts = policy.attempts();
    let mut last_error = String::new();

    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                warn!("{} failed (attempt {}/{}): {}", what, attempt + 1, attempts, e);
                last_error = e.to_string();
                if attempt + 1 < attempts {
                    let delay = policy.delay_for(attempt);
                    debug!("Retrying {} in {:?}", what, delay);
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(UpstreamError::RetryExhausted {
        attempts,
        last: last_error,
    })
}
