// SQLite backend. Buckets live as JSON rows keyed (bucket_size, bucket_ts,
// path); the fan-out for one event runs in a single transaction so readers
// never see a partially applied write.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::instrument;

use super::{BucketGrid, MetricsStore, SystemSeries, unix_now, unix_now_f64};
use crate::aggregator::StatAggregator;
use crate::models::{Bucket, SystemLogEntry, SystemMetricKey, SystemSample, bucket_start};

pub struct SqliteStore {
    pool: SqlitePool,
    resolutions: Vec<u32>,
    ttl_secs: Option<u64>,
    max_latency_samples: usize,
    aggregators: Mutex<HashMap<(u32, SystemMetricKey), StatAggregator>>,
}

fn make_aggregators(resolutions: &[u32], now: f64) -> HashMap<(u32, SystemMetricKey), StatAggregator> {
    let mut aggregators = HashMap::new();
    for &res in resolutions {
        for key in SystemMetricKey::ALL {
            aggregators.insert((res, key), StatAggregator::new(res, now));
        }
    }
    aggregators
}

impl SqliteStore {
    pub async fn connect(
        path: &str,
        resolutions: &[u32],
        ttl_secs: Option<u64>,
        max_latency_samples: usize,
    ) -> anyhow::Result<Self> {
        Self::connect_with_epoch(path, resolutions, ttl_secs, max_latency_samples, unix_now_f64())
            .await
    }

    /// Like [`SqliteStore::connect`] but with an explicit aggregator epoch so
    /// tests control the flush clock.
    pub async fn connect_with_epoch(
        path: &str,
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

        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;

        let aggregators = Mutex::new(make_aggregators(&resolutions, epoch));
        Ok(Self {
            pool,
            resolutions,
            ttl_secs,
            max_latency_samples,
            aggregators,
        })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS request_metrics (
                bucket_size INTEGER NOT NULL,
                bucket_ts INTEGER NOT NULL,
                path TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (bucket_size, bucket_ts, path)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS system_metrics (
                bucket_size INTEGER NOT NULL,
                bucket_ts INTEGER NOT NULL,
                key TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (bucket_size, bucket_ts, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_request_metrics_ts ON request_metrics(bucket_size, bucket_ts)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fan-out write at an explicit timestamp. One transaction covers every
    /// resolution's read-modify-write.
    #[instrument(skip(self), fields(store = "sqlite", operation = "record_request"))]
    pub async fn record_request_at(
        &self,
        now: i64,
        path: &str,
        duration: f64,
        status: u16,
        method: &str,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for &res in &self.resolutions {
            let bucket_ts = bucket_start(now, res);

            let existing: Option<String> = sqlx::query_scalar(
                "SELECT data FROM request_metrics WHERE bucket_size = $1 AND bucket_ts = $2 AND path = $3",
            )
            .bind(res as i64)
            .bind(bucket_ts)
            .bind(path)
            .fetch_optional(&mut *tx)
            .await?;

            let mut bucket: Bucket = match existing {
                Some(data) => serde_json::from_str(&data)
                    .map_err(|e| anyhow::anyhow!("corrupt bucket row: {}", e))?,
                None => Bucket::default(),
            };
            bucket.observe(duration, status, method, self.max_latency_samples);

            sqlx::query(
                r#"
                INSERT INTO request_metrics (bucket_size, bucket_ts, path, data)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT(bucket_size, bucket_ts, path) DO UPDATE SET data = excluded.data
                "#,
            )
            .bind(res as i64)
            .bind(bucket_ts)
            .bind(path)
            .bind(serde_json::to_string(&bucket)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Feeds one probe reading at an explicit timestamp; windows flushed by
    /// the aggregators are persisted afterwards (lock released before I/O).
    pub async fn record_system_sample_at(
        &self,
        now: f64,
        sample: &SystemSample,
    ) -> anyhow::Result<()> {
        let flushed: Vec<(u32, SystemMetricKey, SystemLogEntry)> = {
            let mut aggregators = self
                .aggregators
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            let mut flushed = Vec::new();
            for (&(res, key), agg) in aggregators.iter_mut() {
                agg.add_sample(now, sample.value(key), |entry| {
                    flushed.push((res, key, entry));
                });
            }
            flushed
        };

        for (res, key, entry) in flushed {
            sqlx::query(
                r#"
                INSERT INTO system_metrics (bucket_size, bucket_ts, key, data)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT(bucket_size, bucket_ts, key) DO UPDATE SET data = excluded.data
                "#,
            )
            .bind(res as i64)
            .bind(entry.timestamp)
            .bind(key.as_str())
            .bind(serde_json::to_string(&entry)?)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Deletes rows with `now - bucket_ts > ttl` from both tables.
    #[instrument(skip(self), fields(store = "sqlite", operation = "cleanup_expired"))]
    pub async fn cleanup_expired_at(&self, now: i64) -> anyhow::Result<()> {
        let Some(ttl) = self.ttl_secs else {
            return Ok(());
        };
        let cutoff = now - ttl as i64;

        sqlx::query("DELETE FROM request_metrics WHERE bucket_ts < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM system_metrics WHERE bucket_ts < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MetricsStore for SqliteStore {
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
        self.record_request_at(unix_now(), path, duration, status, method)
            .await
    }

    async fn record_system_sample(&self, sample: &SystemSample) -> anyhow::Result<()> {
        self.record_system_sample_at(unix_now_f64(), sample).await
    }

    #[instrument(skip(self), fields(store = "sqlite", operation = "get_buckets_for_range"))]
    async fn get_buckets_for_range(
        &self,
        bucket_size: u32,
        ts_from: i64,
        ts_to: i64,
    ) -> anyhow::Result<BucketGrid> {
        // Intersection with [ts_from, ts_to]: starts in (ts_from - size, ts_to].
        let rows = sqlx::query(
            r#"
            SELECT bucket_ts, path, data FROM request_metrics
            WHERE bucket_size = $1 AND bucket_ts > $2 AND bucket_ts <= $3
            ORDER BY bucket_ts ASC, path ASC
            "#,
        )
        .bind(bucket_size as i64)
        .bind(ts_from - bucket_size as i64)
        .bind(ts_to)
        .fetch_all(&self.pool)
        .await?;

        let mut grid = BucketGrid::new();
        for row in rows {
            let bucket_ts: i64 = row.try_get("bucket_ts")?;
            let path: String = row.try_get("path")?;
            let data: String = row.try_get("data")?;
            let bucket: Bucket = serde_json::from_str(&data)
                .map_err(|e| anyhow::anyhow!("corrupt bucket row: {}", e))?;
            grid.entry(bucket_ts).or_default().insert(path, bucket);
        }
        Ok(grid)
    }

    #[instrument(skip(self), fields(store = "sqlite", operation = "get_system_series"))]
    async fn get_system_series(
        &self,
        bucket_size: u32,
        ts_from: i64,
        ts_to: i64,
    ) -> anyhow::Result<SystemSeries> {
        let rows = sqlx::query(
            r#"
            SELECT key, data FROM system_metrics
            WHERE bucket_size = $1 AND bucket_ts > $2 AND bucket_ts <= $3
            ORDER BY bucket_ts ASC
            "#,
        )
        .bind(bucket_size as i64)
        .bind(ts_from - bucket_size as i64)
        .bind(ts_to)
        .fetch_all(&self.pool)
        .await?;

        let mut series = SystemSeries::new();
        for row in rows {
            let key: String = row.try_get("key")?;
            let data: String = row.try_get("data")?;
            let key: SystemMetricKey = key.parse()?;
            let entry: SystemLogEntry = serde_json::from_str(&data)
                .map_err(|e| anyhow::anyhow!("corrupt system metric row: {}", e))?;
            series.entry(key).or_default().push(entry);
        }
        Ok(series)
    }

    async fn cleanup_expired(&self) -> anyhow::Result<()> {
        self.cleanup_expired_at(unix_now()).await
    }

    #[instrument(skip(self), fields(store = "sqlite", operation = "reset"))]
    async fn reset(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM request_metrics")
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM system_metrics")
            .execute(&self.pool)
            .await?;

        let mut aggregators = self.aggregators.lock().unwrap_or_else(|e| e.into_inner());
        *aggregators = make_aggregators(&self.resolutions, unix_now_f64());
        Ok(())
    }
}
