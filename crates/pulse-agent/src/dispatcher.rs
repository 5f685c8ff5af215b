//! Drains the local queue into one batch and delivers it with bounded
//! retry.
//!
//! A flush only ever purges the ids it read at its start, and only after
//! the collector answered 200. Records enqueued while a flush is in flight
//! stay queued for the next one.

use crate::transport::{Transport, TransportError};
use crate::wire;
use pulse_common::types::SequenceId;
use pulse_storage::error::StorageError;
use pulse_storage::DurableQueue;
use std::sync::Arc;
use std::time::Duration;

/// The only status code that counts as delivery.
pub const ACCEPTED_STATUS: u16 = 200;

/// How the wait between two failed attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same gap every time.
    Fixed,
    /// Gap doubles after each failure, capped at `max_gap`.
    Exponential { max_gap: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delivery attempts per flush. Zero is treated as one.
    pub attempts: u32,
    pub gap: Duration,
    pub backoff: Backoff,
    /// Upper bound on a single attempt, enforced around the transport.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Wait after the `failed`-th failed attempt (1-based).
    pub fn gap_after(&self, failed: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.gap,
            Backoff::Exponential { max_gap } => {
                let factor = 2u32.saturating_pow(failed.saturating_sub(1));
                self.gap
                    .checked_mul(factor)
                    .unwrap_or(max_gap)
                    .min(max_gap)
            }
        }
    }

    fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

/// Result of one [`BatchDispatcher::flush`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued; no request was made.
    Idle,
    /// The collector accepted the batch and its records were purged.
    Delivered { count: usize, attempts: u32 },
    /// Every attempt failed; the records stay queued.
    Retained {
        pending: usize,
        attempts: u32,
        last_error: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatch: failed to read queue: {0}")]
    Read(#[source] StorageError),

    #[error("Dispatch: failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    /// The batch reached the collector but could not be removed locally; it
    /// will be sent again on the next flush.
    #[error("Dispatch: delivered {count} records but purge failed: {source}")]
    Purge {
        count: usize,
        #[source]
        source: StorageError,
    },
}

pub struct BatchDispatcher {
    queue: Arc<dyn DurableQueue>,
    transport: Arc<dyn Transport>,
    credential: String,
    hostname: String,
    policy: RetryPolicy,
}

impl BatchDispatcher {
    pub fn new(
        queue: Arc<dyn DurableQueue>,
        transport: Arc<dyn Transport>,
        credential: String,
        hostname: String,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            transport,
            credential,
            hostname,
            policy,
        }
    }

    /// Sends everything currently queued as one batch.
    ///
    /// Delivery failures are not errors: they come back as
    /// [`FlushOutcome::Retained`]. Errors are reserved for the local store
    /// and for encoding.
    pub async fn flush(&self) -> Result<FlushOutcome, DispatchError> {
        let records = self.queue.read_all().map_err(DispatchError::Read)?;
        if records.is_empty() {
            return Ok(FlushOutcome::Idle);
        }

        let ids: Vec<SequenceId> = records.iter().map(|r| r.sequence_id).collect();
        let body = wire::encode_batch(&records, &self.hostname)?;
        drop(records);
        tracing::debug!(count = ids.len(), bytes = body.len(), "Flushing batch");

        match self.deliver(&body).await {
            Ok(attempts) => {
                let purged = self
                    .queue
                    .purge(&ids)
                    .map_err(|source| DispatchError::Purge {
                        count: ids.len(),
                        source,
                    })?;
                if purged != ids.len() {
                    tracing::debug!(
                        expected = ids.len(),
                        purged,
                        "Some delivered records were already gone"
                    );
                }
                tracing::info!(count = ids.len(), attempts, "Delivered batch");
                Ok(FlushOutcome::Delivered {
                    count: ids.len(),
                    attempts,
                })
            }
            Err((attempts, e)) => {
                tracing::warn!(
                    pending = ids.len(),
                    attempts,
                    error = %e,
                    "Batch not delivered, keeping records queued"
                );
                Ok(FlushOutcome::Retained {
                    pending: ids.len(),
                    attempts,
                    last_error: e.to_string(),
                })
            }
        }
    }

    /// Runs the attempt loop. Returns the number of attempts made, with the
    /// last failure when none succeeded.
    async fn deliver(&self, body: &[u8]) -> Result<u32, (u32, TransportError)> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;
        loop {
            let err = match self.attempt(body).await {
                Ok(()) => return Ok(attempt),
                Err(e) => e,
            };
            tracing::warn!(attempt, max_attempts, error = %err, "Delivery attempt failed");
            if attempt >= max_attempts {
                return Err((attempt, err));
            }
            tokio::time::sleep(self.policy.gap_after(attempt)).await;
            attempt += 1;
        }
    }

    async fn attempt(&self, body: &[u8]) -> Result<(), TransportError> {
        let timeout = self.policy.attempt_timeout;
        let sent = tokio::time::timeout(timeout, self.transport.deliver(body, &self.credential))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?;
        match sent? {
            ACCEPTED_STATUS => Ok(()),
            status => Err(TransportError::Rejected { status }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(backoff: Backoff) -> RetryPolicy {
        RetryPolicy {
            attempts: 5,
            gap: Duration::from_secs(2),
            backoff,
            attempt_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn fixed_gap_never_grows() {
        let p = policy(Backoff::Fixed);
        assert_eq!(p.gap_after(1), Duration::from_secs(2));
        assert_eq!(p.gap_after(4), Duration::from_secs(2));
    }

    #[test]
    fn exponential_gap_doubles_up_to_cap() {
        let p = policy(Backoff::Exponential {
            max_gap: Duration::from_secs(10),
        });
        assert_eq!(p.gap_after(1), Duration::from_secs(2));
        assert_eq!(p.gap_after(2), Duration::from_secs(4));
        assert_eq!(p.gap_after(3), Duration::from_secs(8));
        assert_eq!(p.gap_after(4), Duration::from_secs(10));
        assert_eq!(p.gap_after(40), Duration::from_secs(10));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let mut p = policy(Backoff::Fixed);
        p.attempts = 0;
        assert_eq!(p.max_attempts(), 1);
    }
}
