use anyhow::{bail, Result};
use pulse_common::types::{percent_of, MemoryStats};
use sysinfo::System;

pub struct MemoryCollector {
    system: System,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    pub fn collect(&mut self) -> Result<MemoryStats> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            bail!("total memory reported as zero");
        }
        let used = self.system.used_memory();
        Ok(MemoryStats {
            used,
            total,
            percent: percent_of(used, total),
        })
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}
