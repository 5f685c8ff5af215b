use crate::dispatcher::{BatchDispatcher, FlushOutcome};
use pulse_collector::SampleProducer;
use pulse_common::types::{Sample, SequenceId};
use pulse_storage::DurableQueue;
use std::future::Future;
use std::sync::Arc;

/// The collection loop: capture, persist, flush, repeat.
///
/// The producer sets the cadence; a host sampler spends its whole
/// collection window inside `capture`. Shutdown is only observed while
/// capturing, so an enqueue or a flush (including its purge) always runs to
/// completion.
pub struct Agent<P> {
    producer: P,
    queue: Arc<dyn DurableQueue>,
    dispatcher: BatchDispatcher,
}

impl<P: SampleProducer> Agent<P> {
    pub fn new(producer: P, queue: Arc<dyn DurableQueue>, dispatcher: BatchDispatcher) -> Self {
        Self {
            producer,
            queue,
            dispatcher,
        }
    }

    /// Runs cycles until `shutdown` resolves.
    ///
    /// Records left over from a previous run are flushed once before the
    /// first capture.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        match self.queue.pending_count() {
            Ok(0) => {}
            Ok(pending) => {
                tracing::info!(pending, "Found undelivered records from a previous run");
                self.flush().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to inspect queue"),
        }

        loop {
            let sample = tokio::select! {
                sample = self.producer.capture() => sample,
                _ = &mut shutdown => {
                    tracing::info!("Shutting down gracefully");
                    break;
                }
            };
            self.commit(sample).await;
        }
    }

    /// Persists one sample and flushes the queue.
    pub async fn commit(&self, sample: Sample) -> Option<FlushOutcome> {
        self.store(&sample);
        self.flush().await
    }

    fn store(&self, sample: &Sample) -> Option<SequenceId> {
        match self.queue.enqueue(&sample.payload, sample.captured_at) {
            Ok(sequence_id) => {
                tracing::debug!(sequence_id, captured_at = sample.captured_at, "Collected metrics");
                Some(sequence_id)
            }
            Err(e) => {
                tracing::error!(
                    captured_at = sample.captured_at,
                    error = %e,
                    "Failed to persist sample, sample lost"
                );
                None
            }
        }
    }

    async fn flush(&self) -> Option<FlushOutcome> {
        match self.dispatcher.flush().await {
            Ok(outcome) => {
                if let FlushOutcome::Retained { pending, .. } = &outcome {
                    tracing::warn!(pending, "Delivery failed, will retry next cycle");
                }
                Some(outcome)
            }
            Err(e) => {
                tracing::error!(error = %e, "Flush failed");
                None
            }
        }
    }
}
