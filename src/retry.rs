//! Bounded exponential-backoff retries for fallible async operations.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::errors::RagError;

/// Calls `op` up to `max_retries` times, sleeping `base_delay * 2^n` after
/// the n-th failure (so the observed delays are `base_delay`,
/// `base_delay * 2`, ...).
///
/// Failures are classified via [`RagError::is_retryable`]: non-retryable
/// errors (bad input, schema mismatch) abort immediately instead of burning
/// the budget. On exhaustion the last error is returned wrapped in
/// [`RagError::RetryExhausted`] with the attempt count.
pub async fn with_retry<T, F, Fut>(
    mut op: F,
    max_retries: usize,
    base_delay: Duration,
) -> Result<T, RagError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RagError>>,
{
    let budget = max_retries.max(1);
    let mut attempt = 0usize;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                attempt += 1;
                if attempt >= budget {
                    return Err(RagError::RetryExhausted {
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
                // Shift capped so pathological budgets cannot overflow.
                let delay = base_delay.saturating_mul(1u32 << (attempt - 1).min(16) as u32);
                warn!(
                    "attempt {attempt}/{budget} failed: {e}; retrying in {:?}",
                    delay
                );
                sleep(delay).await;
            }
        }
    }
}
