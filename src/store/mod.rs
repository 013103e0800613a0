// Backend contract for the bucketed metrics store. Aggregation logic in
// query:: is backend-agnostic; only these operations touch storage.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::BTreeMap;

use crate::models::{Bucket, SystemLogEntry, SystemMetricKey, SystemSample};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Buckets for one resolution: bucket-start timestamp -> route -> Bucket.
/// Route maps keep first-seen insertion order for stable top-N tie-breaks.
pub type BucketGrid = BTreeMap<i64, IndexMap<String, Bucket>>;

/// Flushed system summaries for one resolution: metric key -> entries in
/// ascending timestamp order.
pub type SystemSeries = BTreeMap<SystemMetricKey, Vec<SystemLogEntry>>;

/// Persistence contract for request buckets and system metric summaries.
///
/// Every write fans out to all configured resolutions. Implementations must
/// uphold the Bucket invariant (`count == Σ status_codes == Σ methods ==
/// read + write`) under concurrent writers to the same (resolution,
/// bucket-start, route) key; a networked backend doing separate get+put has
/// a read-then-write race that loses updates and must document that gap
/// unless it offers an atomic merge primitive.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Configured bucket sizes in seconds, ascending.
    fn resolutions(&self) -> &[u32];

    /// Applies one request event to the matching bucket in every resolution.
    async fn record_request(
        &self,
        path: &str,
        duration: f64,
        status: u16,
        method: &str,
    ) -> anyhow::Result<()>;

    /// Feeds one probe reading into every resolution's per-metric aggregator;
    /// flushed windows persist into the system table.
    async fn record_system_sample(&self, sample: &SystemSample) -> anyhow::Result<()>;

    /// Buckets whose `[start, start + bucket_size)` window intersects
    /// `[ts_from, ts_to]`.
    async fn get_buckets_for_range(
        &self,
        bucket_size: u32,
        ts_from: i64,
        ts_to: i64,
    ) -> anyhow::Result<BucketGrid>;

    /// System summaries at the given resolution intersecting `[ts_from, ts_to]`.
    async fn get_system_series(
        &self,
        bucket_size: u32,
        ts_from: i64,
        ts_to: i64,
    ) -> anyhow::Result<SystemSeries>;

    /// Deletes buckets older than the configured TTL in every resolution.
    /// No-op when TTL is unset or the backend expires keys natively.
    async fn cleanup_expired(&self) -> anyhow::Result<()>;

    /// Clears both tables and reinitializes the aggregators.
    async fn reset(&self) -> anyhow::Result<()>;
}

/// Current unix time in whole seconds.
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Current unix time as fractional seconds (aggregator sample clock).
pub fn unix_now_f64() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
