// In-memory backend: fan-out writes, range reads, system flushes, retention

use pulsedash::models::{SystemMetricKey, SystemSample};
use pulsedash::store::{MemoryStore, MetricsStore};

fn sample(v: f64) -> SystemSample {
    SystemSample {
        cpu_percent: v,
        memory_percent: v,
        memory_used_mb: v,
        memory_available_mb: v,
        network_io_sent: v,
        network_io_recv: v,
    }
}

fn store(resolutions: &[u32], ttl_secs: Option<u64>) -> MemoryStore {
    MemoryStore::with_epoch(resolutions, ttl_secs, 10_000, 100.0).unwrap()
}

#[tokio::test]
async fn record_fans_out_to_every_resolution() {
    let store = store(&[5, 30, 300], None);
    store.record_request_at(1000, "/a", 0.02, 200, "GET");

    for &res in &[5u32, 30, 300] {
        let grid = store.get_buckets_for_range(res, 0, 2000).await.unwrap();
        assert_eq!(grid.len(), 1, "resolution {res}");
        let (&start, routes) = grid.iter().next().unwrap();
        assert_eq!(start, 1000 - 1000 % res as i64);
        assert_eq!(routes["/a"].count, 1);
    }
}

#[tokio::test]
async fn resolutions_are_sorted_and_deduped() {
    let store = store(&[300, 5, 30, 5], None);
    assert_eq!(store.resolutions(), &[5, 30, 300]);
}

#[test]
fn empty_resolutions_are_rejected() {
    assert!(MemoryStore::with_epoch(&[], None, 10_000, 0.0).is_err());
}

#[tokio::test]
async fn range_read_uses_window_intersection() {
    let store = store(&[5], None);
    store.record_request_at(997, "/a", 0.01, 200, "GET"); // bucket 995
    store.record_request_at(1001, "/b", 0.01, 200, "GET"); // bucket 1000
    store.record_request_at(1012, "/c", 0.01, 200, "GET"); // bucket 1010

    // [995, 1000) ends before ts_from = 1000 and is excluded; bucket 1010
    // starts at ts_to and is included.
    let grid = store.get_buckets_for_range(5, 1000, 1010).await.unwrap();
    let starts: Vec<i64> = grid.keys().copied().collect();
    assert_eq!(starts, vec![1000, 1010]);

    // Bucket [995, 1000) overlaps ts_from = 999.
    let grid = store.get_buckets_for_range(5, 999, 1010).await.unwrap();
    assert_eq!(grid.keys().copied().collect::<Vec<_>>(), vec![995, 1000, 1010]);
}

#[tokio::test]
async fn unknown_resolution_reads_empty() {
    let store = store(&[5], None);
    store.record_request_at(1000, "/a", 0.01, 200, "GET");
    let grid = store.get_buckets_for_range(60, 0, 2000).await.unwrap();
    assert!(grid.is_empty());
}

#[tokio::test]
async fn system_samples_flush_on_window_boundaries() {
    let store = store(&[5], None);
    store.record_system_sample_at(101.0, &sample(1.0));
    store.record_system_sample_at(103.0, &sample(3.0));
    // No boundary crossed yet.
    let series = store.get_system_series(5, 0, 1000).await.unwrap();
    assert!(series.is_empty());

    // Crossing 105 flushes the [100, 105) window for every metric.
    store.record_system_sample_at(105.5, &sample(2.0));
    let series = store.get_system_series(5, 0, 1000).await.unwrap();
    assert_eq!(series.len(), SystemMetricKey::ALL.len());
    let cpu = &series[&SystemMetricKey::CpuPercent];
    assert_eq!(cpu.len(), 1);
    assert_eq!(cpu[0].timestamp, 105);
    assert_eq!(cpu[0].min, 1.0);
    assert_eq!(cpu[0].max, 3.0);
    assert_eq!(cpu[0].avg, 2.0);
}

#[tokio::test]
async fn cleanup_evicts_only_expired_buckets() {
    let store = store(&[5, 30], Some(60));
    store.record_request_at(1000, "/a", 0.01, 200, "GET");
    store.record_request_at(1100, "/b", 0.01, 200, "GET");

    // Bucket 1000 is exactly at the edge: 1060 - 1000 == ttl, retained.
    store.cleanup_expired_at(1060);
    let grid = store.get_buckets_for_range(5, 0, 2000).await.unwrap();
    assert_eq!(grid.len(), 2);

    store.cleanup_expired_at(1120);
    for &res in &[5u32, 30] {
        let grid = store.get_buckets_for_range(res, 0, 2000).await.unwrap();
        assert_eq!(grid.len(), 1, "resolution {res}");
        assert!(grid.values().next().unwrap().contains_key("/b"));
    }
}

#[tokio::test]
async fn cleanup_without_ttl_is_a_no_op() {
    let store = store(&[5], None);
    store.record_request_at(0, "/old", 0.01, 200, "GET");
    store.cleanup_expired_at(1_000_000);
    let grid = store.get_buckets_for_range(5, 0, 1_000_000).await.unwrap();
    assert_eq!(grid.len(), 1);
}

#[tokio::test]
async fn reset_clears_all_state() {
    let store = store(&[5], Some(60));
    store.record_request_at(1000, "/a", 0.01, 200, "GET");
    store.record_system_sample_at(101.0, &sample(1.0));
    store.record_system_sample_at(106.0, &sample(1.0));

    store.reset().await.unwrap();

    let grid = store.get_buckets_for_range(5, 0, 2000).await.unwrap();
    assert!(grid.is_empty());
    let series = store.get_system_series(5, 0, 2000).await.unwrap();
    assert!(series.is_empty());
}

#[tokio::test]
async fn concurrent_writes_keep_counts_consistent() {
    let store = std::sync::Arc::new(store(&[5], None));
    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..100i64 {
                let path = if i % 2 == 0 { "/even" } else { "/odd" };
                store.record_request_at(1000 + j % 10, path, 0.01, 200, "GET");
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let grid = store.get_buckets_for_range(5, 0, 2000).await.unwrap();
    let total: u64 = grid
        .values()
        .flat_map(|routes| routes.values())
        .map(|b| b.count)
        .sum();
    assert_eq!(total, 800);
}
