//! Shared data model for the pulse agent: queued records, host snapshots and
//! the per-section error marker used when a sub-metric cannot be read.

pub mod types;
