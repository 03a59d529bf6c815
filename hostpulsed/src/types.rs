use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one monitored series for history and alert deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKey {
    Cpu,
    Memory,
    Disk(String),
}

impl MetricKey {
    pub fn disk(mount: impl Into<String>) -> Self {
        Self::Disk(mount.into())
    }

    /// Human label used in alert subjects.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Memory => "Memory",
            Self::Disk(_) => "Disk",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Memory => f.write_str("memory"),
            Self::Disk(mount) => write!(f, "disk:{mount}"),
        }
    }
}

/// Point-in-time view of a single process. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryStats {
    pub percent: f32,
    /// Bytes available for new allocations.
    pub free: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiskStats {
    pub percent: f32,
    pub free: u64,
    pub total: u64,
}

/// Payload of `GET /system_info`. Memory in MB, disk in GB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub cpu_count: usize,
    pub cpu_usage: f32,
    pub free_cpu: f32,
    pub total_memory: f64,
    pub free_memory: f64,
    pub memory_usage: f32,
    pub total_disk: f64,
    pub free_disk: f64,
    pub disk_usage: f32,
}

pub(crate) fn used_percent(total: u64, free: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(free);
    ((used as f64 / total as f64) * 100.0) as f32
}
