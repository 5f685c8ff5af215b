//! Host sampling for the pulse agent.
//!
//! [`HostSampler`] reads CPU, memory, disk, network, static system details
//! and systemd service states, and assembles them into one
//! [`HostSnapshot`]. A section that cannot be read is replaced by an
//! error marker so one failing source never loses the whole sample.

pub mod cpu;
pub mod disk;
pub mod memory;
pub mod network;
pub mod services;
pub mod system;

use async_trait::async_trait;
use chrono::Utc;
use cpu::CpuCollector;
use disk::DiskCollector;
use memory::MemoryCollector;
use network::NetworkCollector;
use pulse_common::types::{HostSnapshot, Reading, Sample};
use std::time::Duration;

/// Produces one timestamped sample per call.
///
/// Capture is infallible at this boundary: implementations embed
/// per-section failures in the payload instead of returning an error.
#[async_trait]
pub trait SampleProducer: Send {
    async fn capture(&mut self) -> Sample;
}

/// [`SampleProducer`] for the local machine, built on `sysinfo`.
pub struct HostSampler {
    hostname: String,
    window: Duration,
    cpu: CpuCollector,
    memory: MemoryCollector,
    disk: DiskCollector,
    network: NetworkCollector,
}

impl HostSampler {
    /// `window` is how long one capture observes the host; CPU usage is
    /// averaged and I/O counters are diffed over it.
    pub fn new(hostname: String, window: Duration) -> Self {
        Self {
            hostname,
            window,
            cpu: CpuCollector::new(),
            memory: MemoryCollector::new(),
            disk: DiskCollector::new(),
            network: NetworkCollector::new(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    async fn snapshot(&mut self) -> HostSnapshot {
        let disk_start = self.disk.mark();
        let net_start = self.network.mark();

        let cpu = reading("cpu", self.cpu.collect_over(self.window).await);
        let memory = reading("memory", self.memory.collect());
        let disk = reading("disk", self.disk.collect(disk_start));
        let network = reading("network", self.network.collect(net_start));

        let memory_total = match &memory {
            Reading::Value(m) => m.total,
            Reading::Unavailable { .. } => 0,
        };
        let system = Reading::Value(system::collect(self.cpu.model(), memory_total));
        let services = reading("services", services::collect().await);

        HostSnapshot {
            hostname: self.hostname.clone(),
            timestamp: Utc::now().timestamp(),
            cpu,
            memory,
            disk,
            network,
            system,
            services,
        }
    }
}

#[async_trait]
impl SampleProducer for HostSampler {
    async fn capture(&mut self) -> Sample {
        let snapshot = self.snapshot().await;
        let captured_at = snapshot.timestamp;
        let payload = serde_json::to_value(&snapshot).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to encode host snapshot");
            serde_json::json!({
                "hostname": snapshot.hostname,
                "timestamp": captured_at,
                "error": e.to_string(),
            })
        });
        tracing::debug!(hostname = %self.hostname, "Captured host snapshot");
        Sample {
            captured_at,
            payload,
        }
    }
}

fn reading<T>(collector: &str, result: anyhow::Result<T>) -> Reading<T> {
    match result {
        Ok(value) => Reading::Value(value),
        Err(e) => {
            tracing::warn!(collector, error = %e, "Collection failed");
            Reading::unavailable(format!("{e:#}"))
        }
    }
}
