// Background loops: periodic system sampling and TTL cleanup, cancelled
// together via oneshot and joined at shutdown.

use crate::engine::MetricsEngine;
use crate::sysinfo_repo::SysinfoRepo;
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing::Instrument;

/// Engine, probe, and shutdown signal for the worker.
pub struct WorkerDeps {
    pub engine: Arc<MetricsEngine>,
    pub sysinfo_repo: Arc<SysinfoRepo>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

/// Worker timing config. Sampling and cleanup tick independently.
pub struct WorkerConfig {
    pub sample_interval_ms: u64,
    pub cleanup_interval_secs: u64,
}

pub fn spawn(deps: WorkerDeps, config: WorkerConfig) -> tokio::task::JoinHandle<()> {
    let WorkerDeps {
        engine,
        sysinfo_repo,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        sample_interval_ms,
        cleanup_interval_secs,
    } = config;

    let worker_span = tracing::span!(tracing::Level::DEBUG, "worker", sample_interval_ms);

    let task = async move {
        let mut sample_tick = interval(Duration::from_millis(sample_interval_ms));
        sample_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut cleanup_tick = interval(Duration::from_secs(cleanup_interval_secs));
        cleanup_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = sample_tick.tick() => {
                    match sysinfo_repo.read_sample().await {
                        Ok(sample) => engine.record_system_metrics(&sample).await,
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                operation = "read_sample",
                                "system probe failed"
                            );
                        }
                    }
                }
                _ = cleanup_tick.tick() => {
                    if let Err(e) = engine.store().cleanup_expired().await {
                        tracing::warn!(
                            error = %e,
                            operation = "cleanup_expired",
                            "failed to evict expired buckets"
                        );
                    } else {
                        tracing::debug!(operation = "cleanup_expired", "expired buckets evicted");
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
            }
        }
    };

    tokio::spawn(task.instrument(worker_span))
}
