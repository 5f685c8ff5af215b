//! Durable local queue for samples that have not yet been delivered.
//!
//! The default implementation ([`queue::SqliteQueue`]) keeps records in a
//! single SQLite table in WAL mode. Records are appended with a fresh
//! sequence id and only leave the table through [`DurableQueue::purge`],
//! which the dispatcher calls after the collector acknowledged a batch.

pub mod error;
pub mod queue;


use error::Result;
use pulse_common::types::{MetricRecord, SequenceId};
use serde_json::Value;

/// Crash-safe FIFO store of pending metric records.
///
/// Implementations serialize their own operations, so a handle can be
/// shared between the agent loop and the dispatcher behind an `Arc`.
pub trait DurableQueue: Send + Sync {
    /// Appends one record and returns its newly assigned sequence id.
    ///
    /// The record is durable once this returns `Ok`.
    fn enqueue(&self, payload: &Value, captured_at: i64) -> Result<SequenceId>;

    /// Returns every stored record in ascending sequence-id order.
    ///
    /// The result is a consistent snapshot; no record is partially visible.
    fn read_all(&self) -> Result<Vec<MetricRecord>>;

    /// Removes exactly the records whose id is in `ids` and returns how many
    /// rows were deleted.
    ///
    /// Unknown ids are ignored, so calling this twice with the same ids is
    /// harmless. Either every targeted row is removed or none is.
    fn purge(&self, ids: &[SequenceId]) -> Result<usize>;

    /// Number of records currently waiting for delivery.
    fn pending_count(&self) -> Result<u64>;
}
