use pulse_common::types::SystemInfo;
use sysinfo::System;

/// Static host identifiers. `cpu_model` comes from the CPU collector since
/// it already holds a refreshed CPU list.
pub fn collect(cpu_model: Option<String>, memory_total_bytes: u64) -> SystemInfo {
    let name = System::name().unwrap_or_else(|| "unknown".to_string());
    let kernel = System::kernel_version().unwrap_or_default();
    let os = if kernel.is_empty() {
        name
    } else {
        format!("{name} {kernel}")
    };
    SystemInfo {
        os,
        os_version: System::os_version().unwrap_or_else(|| "unknown".to_string()),
        cpu_model: cpu_model.unwrap_or_else(|| "unknown".to_string()),
        memory_total_bytes,
    }
}

/// The OS hostname, or `"unknown"` if it cannot be read.
pub fn hostname() -> String {
    System::host_name().unwrap_or_else(|| "unknown".to_string())
}
