//! The pulse agent: samples the host, queues each sample on disk and
//! delivers queued samples to the collector in batches.
//!
//! Delivery is at-least-once. A record leaves the local queue only after
//! the collector answered a batch containing it with `200 OK`.

pub mod agent;
pub mod config;
pub mod dispatcher;
pub mod transport;
pub mod wire;
