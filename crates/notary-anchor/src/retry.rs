//! Retry with exponential backoff for ledger calls.
//!
//! Retries only transient failures ([`AnchorError::is_transient`]). Each
//! attempt is bounded by the policy timeout; an elapsed timeout counts as a
//! transient failure.

use std::time::Duration;

use crate::ledger::{AnchorError, AnchorRef, LedgerAnchor};

/// Retry and timeout settings for ledger calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each retry.
    pub base_delay: Duration,
    /// Upper bound on a single ledger call.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    /// 3 retries, 200ms base delay (200ms, 400ms, 800ms), 30s per attempt.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// No retries and no backoff. Used by tests and sweeps that manage
    /// their own cadence.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            timeout,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Anchor `payload` under `label`, retrying transient failures.
///
/// Returns the final result and the number of attempts made.
pub async fn anchor_with_retry(
    ledger: &dyn LedgerAnchor,
    payload: &[u8],
    label: &str,
    policy: &RetryPolicy,
) -> (Result<AnchorRef, AnchorError>, u32) {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let result = match tokio::time::timeout(
            policy.timeout,
            ledger.anchor(payload.to_vec(), label),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AnchorError::Timeout {
                secs: policy.timeout.as_secs(),
            }),
        };

        match result {
            Ok(anchor) => return (Ok(anchor), attempts),
            Err(e) if !e.is_transient() || attempts > policy.max_retries => {
                return (Err(e), attempts);
            }
            Err(e) => {
                let delay = policy.delay_for(attempts - 1);
                tracing::warn!(
                    attempt = attempts,
                    max_retries = policy.max_retries,
                    network = ledger.network(),
                    label,
                    "ledger anchor failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
