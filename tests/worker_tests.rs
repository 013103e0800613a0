// Worker integration tests: spawn, tick, shutdown, assert side effects

use pulsedash::engine::MetricsEngine;
use pulsedash::store::{MemoryStore, MetricsStore, unix_now};
use pulsedash::sysinfo_repo::SysinfoRepo;
use pulsedash::worker::{WorkerConfig, WorkerDeps, spawn};
use std::sync::Arc;

#[tokio::test]
async fn worker_samples_and_shuts_down_cleanly() {
    let store = Arc::new(MemoryStore::new(&[5], None, 10_000).unwrap());
    let engine = Arc::new(MetricsEngine::new(store.clone()));
    let sysinfo_repo = Arc::new(SysinfoRepo::new());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let handle = spawn(
        WorkerDeps {
            engine,
            sysinfo_repo,
            shutdown_rx,
        },
        WorkerConfig {
            sample_interval_ms: 25,
            cleanup_interval_secs: 3600,
        },
    );

    // Let a few sample ticks land. Window boundaries rarely fall inside this
    // test, so only assert the worker runs and exits, not flushed output.
    tokio::time::sleep(tokio::time::Duration::from_millis(150)).await;
    let _ = shutdown_tx.send(());
    handle.await.unwrap();
}

#[tokio::test]
async fn worker_cleanup_tick_evicts_expired_buckets() {
    let store = Arc::new(MemoryStore::new(&[5], Some(60), 10_000).unwrap());
    let now = unix_now();
    store.record_request_at(now - 10_000, "/stale", 0.01, 200, "GET");
    store.record_request_at(now, "/fresh", 0.01, 200, "GET");

    let engine = Arc::new(MetricsEngine::new(store.clone()));
    let sysinfo_repo = Arc::new(SysinfoRepo::new());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    // The first cleanup tick fires immediately on spawn.
    let handle = spawn(
        WorkerDeps {
            engine,
            sysinfo_repo,
            shutdown_rx,
        },
        WorkerConfig {
            sample_interval_ms: 60_000,
            cleanup_interval_secs: 3600,
        },
    );

    tokio::time::sleep(tokio::time::Duration::from_millis(150)).await;
    let _ = shutdown_tx.send(());
    handle.await.unwrap();

    let grid = store
        .get_buckets_for_range(5, now - 20_000, now + 10)
        .await
        .unwrap();
    let routes: Vec<&String> = grid.values().flat_map(|r| r.keys()).collect();
    assert!(routes.iter().any(|r| *r == "/fresh"));
    assert!(!routes.iter().any(|r| *r == "/stale"));
}
