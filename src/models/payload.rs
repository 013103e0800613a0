// Wire payloads served by the query endpoints

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{SystemLogEntry, SystemMetricKey};

/// One named time series; `data` is `(timestamp, value)` pairs in bucket order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series<T> {
    pub name: String,
    pub data: Vec<(i64, T)>,
}

/// System metric series for the chosen resolution plus the resolution itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemMetricsPayload {
    #[serde(flatten)]
    pub series: BTreeMap<SystemMetricKey, Vec<SystemLogEntry>>,
    pub bucket_size_secs: u32,
}

/// Everything `get_metrics` bundles for one query window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsPayload {
    pub latencies: Vec<Series<f64>>,
    pub read_write: Vec<Series<u64>>,
    pub status_code: Vec<Series<u64>>,
    pub top_routes: Vec<(String, u64)>,
    pub top_slowest_routes: Vec<(String, f64)>,
    pub top_error_prone_requests: Vec<(String, u64)>,
    pub requests_per_method: BTreeMap<String, u64>,
    pub overview_table: TableOverview,
    pub system: SystemMetricsPayload,
    pub bucket_size_secs: u32,
}

/// Per-route row of the tabular overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub route: String,
    pub last_called: i64,
    pub total_call_count: u64,
    pub total_errors_count: u64,
    /// Percent of calls with status >= 400; 0 when the route has no calls.
    pub error_rate: f64,
    /// Mean of `60 * count / bucket_size` across the route's buckets.
    pub requests_per_minute: f64,
    /// Mean of `count / bucket_size` across the route's buckets.
    pub throughput_rps: f64,
    /// Nearest-rank p99 over all latencies across the route's buckets; 0 when empty.
    pub p99_latency: f64,
}

/// Table rows plus grid maxima for relative scaling by the consumer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableOverview {
    pub rows: Vec<TableRow>,
    pub max_p99_latency: f64,
    pub max_error_rate: f64,
    pub total: usize,
}
