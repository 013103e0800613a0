// System metric keys, aggregated entries, raw probe samples

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One flushed min/max/avg summary for a scalar metric. `timestamp` is the
/// right boundary of the aggregation window, aligned to the bucket size.
/// Immutable once flushed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemLogEntry {
    pub timestamp: i64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// The scalar process/system metrics the store tracks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SystemMetricKey {
    CpuPercent,
    MemoryPercent,
    MemoryUsedMb,
    MemoryAvailableMb,
    NetworkIoSent,
    NetworkIoRecv,
}

impl SystemMetricKey {
    pub const ALL: [SystemMetricKey; 6] = [
        SystemMetricKey::CpuPercent,
        SystemMetricKey::MemoryPercent,
        SystemMetricKey::MemoryUsedMb,
        SystemMetricKey::MemoryAvailableMb,
        SystemMetricKey::NetworkIoSent,
        SystemMetricKey::NetworkIoRecv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SystemMetricKey::CpuPercent => "cpu_percent",
            SystemMetricKey::MemoryPercent => "memory_percent",
            SystemMetricKey::MemoryUsedMb => "memory_used_mb",
            SystemMetricKey::MemoryAvailableMb => "memory_available_mb",
            SystemMetricKey::NetworkIoSent => "network_io_sent",
            SystemMetricKey::NetworkIoRecv => "network_io_recv",
        }
    }
}

impl fmt::Display for SystemMetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemMetricKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SystemMetricKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown system metric key: {}", s))
    }
}

/// One raw probe reading. All six metric values taken at the same instant;
/// the network counters are cumulative byte totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_mb: f64,
    pub memory_available_mb: f64,
    pub network_io_sent: f64,
    pub network_io_recv: f64,
}

impl SystemSample {
    pub fn value(&self, key: SystemMetricKey) -> f64 {
        match key {
            SystemMetricKey::CpuPercent => self.cpu_percent,
            SystemMetricKey::MemoryPercent => self.memory_percent,
            SystemMetricKey::MemoryUsedMb => self.memory_used_mb,
            SystemMetricKey::MemoryAvailableMb => self.memory_available_mb,
            SystemMetricKey::NetworkIoSent => self.network_io_sent,
            SystemMetricKey::NetworkIoRecv => self.network_io_recv,
        }
    }
}
