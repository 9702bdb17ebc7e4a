//! # Anchorer
//!
//! Submits commitments to the ledger through the journal. A commitment is
//! journaled before the first ledger call. [`Anchorer::submit`] makes one
//! attempt bounded by the inline timeout so callers are never held by a
//! slow ledger; on failure the commitment stays pending with its attempt
//! count and last error, and [`Anchorer::retry_pending`] resubmits it later
//! under the full retry policy. Delivery is at-least-once from the ledger's point of
//! view and at-most-one recorded reference per event locally.

use std::sync::Arc;
use std::time::Duration;

use notary_core::ContentDigest;

use crate::commitment::AnchorCommitment;
use crate::journal::{AnchorJournal, Claim, JournalEntry};
use crate::ledger::{AnchorError, AnchorRef, LedgerAnchor};
use crate::retry::{anchor_with_retry, RetryPolicy};

/// Result of submitting one commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorOutcome {
    /// The ledger holds the commitment.
    Anchored(AnchorRef),
    /// Not anchored yet; the journal keeps it for retry.
    Pending {
        /// Attempts made so far.
        attempts: u32,
        /// Most recent failure, if any.
        last_error: Option<String>,
    },
}

impl AnchorOutcome {
    /// The reference, when anchored.
    pub fn anchor_ref(&self) -> Option<&AnchorRef> {
        match self {
            Self::Anchored(r) => Some(r),
            Self::Pending { .. } => None,
        }
    }
}

/// Journaled, retrying ledger client.
pub struct Anchorer {
    ledger: Arc<dyn LedgerAnchor>,
    journal: AnchorJournal,
    policy: RetryPolicy,
    inline_timeout: Duration,
}

impl std::fmt::Debug for Anchorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Anchorer")
            .field("network", &self.ledger.network())
            .field("journal_len", &self.journal.len())
            .field("policy", &self.policy)
            .field("inline_timeout", &self.inline_timeout)
            .finish()
    }
}

impl Anchorer {
    /// Create an anchorer over `ledger`. The inline attempt is bounded by
    /// the policy timeout until [`with_inline_timeout`](Self::with_inline_timeout)
    /// says otherwise.
    pub fn new(ledger: Arc<dyn LedgerAnchor>, policy: RetryPolicy) -> Self {
        Self {
            ledger,
            journal: AnchorJournal::new(),
            inline_timeout: policy.timeout,
            policy,
        }
    }

    /// Bound the single attempt made by [`submit`](Self::submit).
    pub fn with_inline_timeout(mut self, timeout: Duration) -> Self {
        self.inline_timeout = timeout;
        self
    }

    /// The journal.
    pub fn journal(&self) -> &AnchorJournal {
        &self.journal
    }

    /// The retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Ledger network name.
    pub fn network(&self) -> &str {
        self.ledger.network()
    }

    /// Journal `commitment` and make one bounded attempt to anchor it.
    /// Retries belong to [`retry_pending`](Self::retry_pending).
    pub async fn submit(&self, commitment: AnchorCommitment) -> AnchorOutcome {
        let key = commitment.key().to_string();
        let outcome = match self.journal.claim(commitment.clone()) {
            Claim::Anchored(anchor) => AnchorOutcome::Anchored(anchor),
            Claim::InFlight { attempts } => AnchorOutcome::Pending {
                attempts,
                last_error: None,
            },
            Claim::Submit => {
                let inline = RetryPolicy::no_retry(self.inline_timeout);
                self.submit_claimed(commitment, &inline).await
            }
        };
        outcome.log(&key)
    }

    /// Resubmit every pending commitment, oldest first. Returns each
    /// commitment with its new outcome.
    pub async fn retry_pending(&self) -> Vec<(AnchorCommitment, AnchorOutcome)> {
        let claimed = self.journal.claim_pending();
        if !claimed.is_empty() {
            tracing::info!(count = claimed.len(), "retrying pending anchors");
        }
        let mut results = Vec::with_capacity(claimed.len());
        for commitment in claimed {
            let key = commitment.key().to_string();
            let outcome = self
                .submit_claimed(commitment.clone(), &self.policy)
                .await
                .log(&key);
            results.push((commitment, outcome));
        }
        results
    }

    /// Every journaled commitment not yet anchored.
    pub fn pending(&self) -> Vec<JournalEntry> {
        self.journal.pending()
    }

    /// Ledger history for a document root.
    ///
    /// # Errors
    ///
    /// Returns the ledger error, or [`AnchorError::Timeout`].
    pub async fn history(&self, root: &ContentDigest) -> Result<Vec<AnchorRef>, AnchorError> {
        match tokio::time::timeout(self.policy.timeout, self.ledger.history(root)).await {
            Ok(result) => result,
            Err(_) => Err(AnchorError::Timeout {
                secs: self.policy.timeout.as_secs(),
            }),
        }
    }

    async fn submit_claimed(
        &self,
        commitment: AnchorCommitment,
        policy: &RetryPolicy,
    ) -> AnchorOutcome {
        let key = commitment.key();
        let payload = match commitment.payload() {
            Ok(p) => p,
            Err(e) => {
                let attempts = self.journal.record_failure(&key, 0, e.to_string());
                return AnchorOutcome::Pending {
                    attempts,
                    last_error: Some(e.to_string()),
                };
            }
        };

        let (result, attempts) =
            anchor_with_retry(self.ledger.as_ref(), &payload, &commitment.label(), policy).await;
        match result {
            Ok(anchor) => {
                AnchorOutcome::Anchored(self.journal.record_success(&key, anchor, attempts))
            }
            Err(e) => {
                let total = self.journal.record_failure(&key, attempts, e.to_string());
                AnchorOutcome::Pending {
                    attempts: total,
                    last_error: Some(e.to_string()),
                }
            }
        }
    }
}

impl AnchorOutcome {
    fn log(self, key: &str) -> Self {
        match &self {
            Self::Anchored(r) => tracing::debug!(
                key,
                transaction_id = %r.transaction_id,
                sequence = r.sequence,
                "commitment anchored"
            ),
            Self::Pending {
                attempts,
                last_error,
            } => tracing::warn!(
                key,
                attempts,
                error = last_error.as_deref().unwrap_or(""),
                "commitment left pending"
            ),
        }
        self
    }
}
