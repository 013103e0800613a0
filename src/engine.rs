// External interface over a backend: record paths never fail the caller,
// query paths surface backend faults as retrievable errors.

use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::models::{MetricsPayload, SystemMetricsPayload, SystemSample, TableOverview};
use crate::query;
use crate::store::MetricsStore;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("metrics backend read failed: {0}")]
    Backend(#[source] anyhow::Error),
}

pub struct MetricsEngine {
    store: Arc<dyn MetricsStore>,
    top_n: usize,
}

impl MetricsEngine {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self {
            store,
            top_n: query::TOP_N,
        }
    }

    pub fn with_top_n(store: Arc<dyn MetricsStore>, top_n: usize) -> Self {
        Self { store, top_n }
    }

    pub fn store(&self) -> &Arc<dyn MetricsStore> {
        &self.store
    }

    /// Records one request event. Must not fail the instrumented request:
    /// backend faults are logged and the event is dropped.
    pub async fn record_request_metrics(
        &self,
        path: &str,
        duration_secs: f64,
        status: u16,
        method: &str,
    ) {
        if let Err(e) = self
            .store
            .record_request(path, duration_secs, status, method)
            .await
        {
            tracing::warn!(error = %e, path, method, "failed to record request metrics");
        }
    }

    /// Feeds one system probe reading into the store. Sampler-only entry
    /// point; faults are logged, never propagated.
    pub async fn record_system_metrics(&self, sample: &SystemSample) {
        if let Err(e) = self.store.record_system_sample(sample).await {
            tracing::warn!(error = %e, "failed to record system metrics");
        }
    }

    /// Bundles every derived view for `[ts_from, ts_to]` at an adaptively
    /// chosen resolution.
    #[instrument(skip(self), fields(operation = "get_metrics"))]
    pub async fn get_metrics(&self, ts_from: i64, ts_to: i64) -> Result<MetricsPayload, EngineError> {
        let bucket_size = query::select_bucket_size(self.store.resolutions(), ts_to - ts_from);

        let grid = self
            .store
            .get_buckets_for_range(bucket_size, ts_from, ts_to)
            .await
            .map_err(EngineError::Backend)?;
        let system_series = self
            .store
            .get_system_series(bucket_size, ts_from, ts_to)
            .await
            .map_err(EngineError::Backend)?;

        Ok(MetricsPayload {
            latencies: query::latency_series(&grid, query::LATENCY_QUANTILE),
            read_write: query::read_write_series(&grid),
            status_code: query::status_code_series(&grid),
            top_routes: query::top_routes(&grid, self.top_n),
            top_slowest_routes: query::top_slowest_routes(&grid, self.top_n),
            top_error_prone_requests: query::top_error_prone_routes(&grid, self.top_n),
            requests_per_method: query::requests_per_method(&grid),
            overview_table: query::table_overview(&grid, bucket_size),
            system: SystemMetricsPayload {
                series: system_series,
                bucket_size_secs: bucket_size,
            },
            bucket_size_secs: bucket_size,
        })
    }

    /// Per-route tabular overview for `[ts_from, ts_to]`.
    #[instrument(skip(self), fields(operation = "get_table_overview"))]
    pub async fn get_table_overview(
        &self,
        ts_from: i64,
        ts_to: i64,
    ) -> Result<TableOverview, EngineError> {
        let bucket_size = query::select_bucket_size(self.store.resolutions(), ts_to - ts_from);
        let grid = self
            .store
            .get_buckets_for_range(bucket_size, ts_from, ts_to)
            .await
            .map_err(EngineError::Backend)?;
        Ok(query::table_overview(&grid, bucket_size))
    }

    /// Clears all stored buckets and reinitializes the aggregators.
    pub async fn reset(&self) -> Result<(), EngineError> {
        self.store.reset().await.map_err(EngineError::Backend)
    }
}
