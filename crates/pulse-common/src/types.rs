use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Identifier assigned by the durable queue at enqueue time.
///
/// Strictly increasing in enqueue order and never reused, even after the
/// record carrying it has been purged.
pub type SequenceId = i64;

/// One captured sample waiting in the local queue for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub sequence_id: SequenceId,
    /// Seconds since the Unix epoch at which the sample was taken.
    pub captured_at: i64,
    pub payload: Value,
}

/// Output of a single producer invocation, before the queue assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub captured_at: i64,
    pub payload: Value,
}

impl Sample {
    pub fn now(payload: Value) -> Self {
        Self {
            captured_at: Utc::now().timestamp(),
            payload,
        }
    }
}

/// A sub-metric that was either read successfully or replaced by an error
/// marker.
///
/// Serialized untagged, so an unavailable reading shows up on the wire as
/// `{"error": "..."}` in place of the section. `Unavailable` is listed first
/// so that marker decodes back to itself even for map-shaped sections; a map
/// with an `error` key therefore reads as a marker.
///
/// # Examples
///
/// ```
/// use pulse_common::types::Reading;
///
/// let r: Reading<u64> = Reading::unavailable("permission denied");
/// assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"error":"permission denied"}"#);
/// assert_eq!(serde_json::from_str::<Reading<u64>>(r#"{"error":"permission denied"}"#).unwrap(), r);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading<T> {
    Unavailable { error: String },
    Value(T),
}

impl<T> Reading<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Reading::Unavailable {
            error: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    /// Average global utilisation over the sampling window, in percent.
    pub avg: f64,
    /// Highest single reading over the window.
    pub max: f64,
    pub cores: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub used: u64,
    pub total: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskStats {
    pub used: u64,
    pub total: u64,
    pub percent: f64,
    /// Bytes read during the sampling window.
    pub read_bytes: u64,
    /// Bytes written during the sampling window.
    pub write_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub in_bytes: u64,
    pub out_bytes: u64,
}

/// Static host identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub os_version: String,
    pub cpu_model: String,
    pub memory_total_bytes: u64,
}

/// Full snapshot produced by the host sampler. This is the payload stored in
/// the queue and sent to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub hostname: String,
    pub timestamp: i64,
    pub cpu: Reading<CpuStats>,
    pub memory: Reading<MemoryStats>,
    pub disk: Reading<DiskStats>,
    pub network: Reading<NetworkStats>,
    pub system: Reading<SystemInfo>,
    /// Service unit name to its current state (e.g. `"running"`).
    pub services: Reading<BTreeMap<String, String>>,
}

/// Percentage of `part` in `total`, `0.0` when `total` is zero.
pub fn percent_of(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
