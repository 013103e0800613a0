// In-memory backend. One store-wide lock serializes every fan-out write so a
// reader never observes a partially applied event across resolutions.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::instrument;

use super::{BucketGrid, MetricsStore, SystemSeries, unix_now, unix_now_f64};
use crate::aggregator::StatAggregator;
use crate::models::{Bucket, SystemLogEntry, SystemMetricKey, SystemSample, bucket_start};
use crate::query::bucket_in_range;

/// Default cap on retained latency samples per bucket.
pub const DEFAULT_MAX_LATENCY_SAMPLES: usize = 10_000;

struct Inner {
    /// resolution -> bucket start -> route -> Bucket
    requests: HashMap<u32, BTreeMap<i64, IndexMap<String, Bucket>>>,
    /// resolution -> window boundary -> metric -> flushed entry
    system: HashMap<u32, BTreeMap<i64, BTreeMap<SystemMetricKey, SystemLogEntry>>>,
    /// (resolution, metric) -> aggregator, each flushing on its own cadence
    aggregators: HashMap<(u32, SystemMetricKey), StatAggregator>,
}

impl Inner {
    fn new(resolutions: &[u32], now: f64) -> Self {
        let mut aggregators = HashMap::new();
        for &res in resolutions {
            for key in SystemMetricKey::ALL {
                aggregators.insert((res, key), StatAggregator::new(res, now));
            }
        }
        Self {
            requests: HashMap::new(),
            system: HashMap::new(),
            aggregators,
        }
    }
}

pub struct MemoryStore {
    resolutions: Vec<u32>,
    ttl_secs: Option<u64>,
    max_latency_samples: usize,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(
        resolutions: &[u32],
        ttl_secs: Option<u64>,
        max_latency_samples: usize,
    ) -> anyhow::Result<Self> {
        Self::with_epoch(resolutions, ttl_secs, max_latency_samples, unix_now_f64())
    }

    /// Like [`MemoryStore::new`] but with an explicit aggregator epoch so
    /// tests control the flush clock.
    pub fn with_epoch(
        resolutions: &[u32],
        ttl_secs: Option<u64>,
        max_latency_samples: usize,
        epoch: f64,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !resolutions.is_empty(),
            "at least one bucket resolution must be configured"
        );
        let mut resolutions = resolutions.to_vec();
        resolutions.sort_unstable();
        resolutions.dedup();

        let inner = Inner::new(&resolutions, epoch);
        Ok(Self {
            resolutions,
            ttl_secs,
            max_latency_samples,
            inner: Mutex::new(inner),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Recover the data on poisoning instead of propagating the panic.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fan-out write at an explicit timestamp (tests control the clock).
    pub fn record_request_at(&self, now: i64, path: &str, duration: f64, status: u16, method: &str) {
        let mut inner = self.lock();
        for &res in &self.resolutions {
            let start = bucket_start(now, res);
            let bucket = inner
                .requests
                .entry(res)
                .or_default()
                .entry(start)
                .or_default()
                .entry(path.to_string())
                .or_default();
            bucket.observe(duration, status, method, self.max_latency_samples);
        }
    }

    /// Feeds one probe reading into every resolution's aggregators at an
    /// explicit timestamp.
    pub fn record_system_sample_at(&self, now: f64, sample: &SystemSample) {
        let mut inner = self.lock();
        let inner = &mut *inner;

        let mut flushed: Vec<(u32, SystemMetricKey, SystemLogEntry)> = Vec::new();
        for (&(res, key), agg) in inner.aggregators.iter_mut() {
            agg.add_sample(now, sample.value(key), |entry| {
                flushed.push((res, key, entry));
            });
        }

        for (res, key, entry) in flushed {
            inner
                .system
                .entry(res)
                .or_default()
                .entry(entry.timestamp)
                .or_default()
                .insert(key, entry);
        }
    }

    /// Evicts buckets with `now - bucket_start > ttl` in every resolution.
    pub fn cleanup_expired_at(&self, now: i64) {
        let Some(ttl) = self.ttl_secs else {
            return;
        };
        let ttl = ttl as i64;

        let mut inner = self.lock();
        for table in inner.requests.values_mut() {
            table.retain(|&start, _| now - start <= ttl);
        }
        for table in inner.system.values_mut() {
            table.retain(|&start, _| now - start <= ttl);
        }
    }
}

#[async_trait]
impl MetricsStore for MemoryStore {
    fn resolutions(&self) -> &[u32] {
        &self.resolutions
    }

    async fn record_request(
        &self,
        path: &str,
        duration: f64,
        status: u16,
        method: &str,
    ) -> anyhow::Result<()> {
        self.record_request_at(unix_now(), path, duration, status, method);
        Ok(())
    }

    async fn record_system_sample(&self, sample: &SystemSample) -> anyhow::Result<()> {
        self.record_system_sample_at(unix_now_f64(), sample);
        Ok(())
    }

    #[instrument(skip(self), fields(store = "memory", operation = "get_buckets_for_range"))]
    async fn get_buckets_for_range(
        &self,
        bucket_size: u32,
        ts_from: i64,
        ts_to: i64,
    ) -> anyhow::Result<BucketGrid> {
        let inner = self.lock();
        let Some(table) = inner.requests.get(&bucket_size) else {
            return Ok(BucketGrid::new());
        };

        let grid = table
            .iter()
            .filter(|&(&start, _)| bucket_in_range(start, bucket_size, ts_from, ts_to))
            .map(|(&start, routes)| (start, routes.clone()))
            .collect();
        Ok(grid)
    }

    #[instrument(skip(self), fields(store = "memory", operation = "get_system_series"))]
    async fn get_system_series(
        &self,
        bucket_size: u32,
        ts_from: i64,
        ts_to: i64,
    ) -> anyhow::Result<SystemSeries> {
        let inner = self.lock();
        let mut series = SystemSeries::new();

        if let Some(table) = inner.system.get(&bucket_size) {
            for (&ts, entries) in table {
                if !bucket_in_range(ts, bucket_size, ts_from, ts_to) {
                    continue;
                }
                for (&key, &entry) in entries {
                    series.entry(key).or_default().push(entry);
                }
            }
        }
        Ok(series)
    }

    #[instrument(skip(self), fields(store = "memory", operation = "cleanup_expired"))]
    async fn cleanup_expired(&self) -> anyhow::Result<()> {
        self.cleanup_expired_at(unix_now());
        Ok(())
    }

    #[instrument(skip(self), fields(store = "memory", operation = "reset"))]
    async fn reset(&self) -> anyhow::Result<()> {
        let mut inner = self.lock();
        *inner = Inner::new(&self.resolutions, unix_now_f64());
        Ok(())
    }
}
