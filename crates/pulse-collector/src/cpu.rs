use anyhow::{bail, Result};
use pulse_common::types::CpuStats;
use std::time::Duration;
use sysinfo::System;

/// Interval between two global CPU usage readings inside a window.
const READING_INTERVAL: Duration = Duration::from_secs(1);

pub struct CpuCollector {
    system: System,
}

impl CpuCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self { system }
    }

    /// Takes one usage reading per second for the length of `window` and
    /// summarizes them. This is where the sampler spends the collection
    /// interval.
    pub async fn collect_over(&mut self, window: Duration) -> Result<CpuStats> {
        let readings = window.as_secs().max(1);
        let mut samples = Vec::with_capacity(usize::try_from(readings).unwrap_or_default());
        for _ in 0..readings {
            tokio::time::sleep(READING_INTERVAL.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)).await;
            self.system.refresh_cpu_usage();
            samples.push(self.system.global_cpu_usage());
        }
        summarize(&samples, self.system.cpus().len())
    }

    /// Brand string of the first CPU, e.g. `"AMD EPYC 7763 64-Core Processor"`.
    pub fn model(&self) -> Option<String> {
        self.system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
    }
}

impl Default for CpuCollector {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn summarize(samples: &[f32], cores: usize) -> Result<CpuStats> {
    if cores == 0 {
        bail!("no CPUs reported by the OS");
    }
    if samples.is_empty() {
        bail!("no CPU readings taken");
    }
    let sum: f64 = samples.iter().map(|s| f64::from(*s)).sum();
    let max = samples.iter().copied().fold(f32::MIN, f32::max);
    Ok(CpuStats {
        avg: sum / samples.len() as f64,
        max: f64::from(max),
        cores,
    })
}
