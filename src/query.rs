// Resolution selection + derived views over fetched bucket grids.
// Pure logic only; backend access stays in store::.

use indexmap::IndexMap;

use crate::models::{Series, StatusClass, TableOverview, TableRow};
use crate::store::BucketGrid;

/// Preferred number of data points per series in a query response.
pub const TARGET_POINTS: i64 = 150;

/// Hard ceiling on data points per series; coarser resolutions win over fidelity.
pub const MAX_POINTS: i64 = 250;

/// Quantile used for latency series and table p99 columns.
pub const LATENCY_QUANTILE: f64 = 0.99;

/// Entries returned by the top-N views.
pub const TOP_N: usize = 5;

/// Picks the coarsest configured bucket size that keeps the point count for
/// `range_secs` within [`TARGET_POINTS`]/[`MAX_POINTS`]. `resolutions` must be
/// sorted ascending and non-empty.
pub fn select_bucket_size(resolutions: &[u32], range_secs: i64) -> u32 {
    select_bucket_size_bounded(resolutions, range_secs, TARGET_POINTS, MAX_POINTS)
}

/// Greedy bound, not a global optimum: prefer the smallest adequate resolution
/// (maximum fidelity), fall back largest-to-smallest against `max_points`, and
/// finally settle for the largest configured resolution.
pub fn select_bucket_size_bounded(
    resolutions: &[u32],
    range_secs: i64,
    target_points: i64,
    max_points: i64,
) -> u32 {
    debug_assert!(!resolutions.is_empty(), "resolutions must be configured");
    let smallest = resolutions.first().copied().unwrap_or(1);
    let largest = resolutions.last().copied().unwrap_or(smallest);
    let range = range_secs.max(0);

    let ideal = (range / target_points.max(1)).max(smallest as i64);

    if let Some(&chosen) = resolutions.iter().find(|&&r| r as i64 >= ideal)
        && range / chosen as i64 <= max_points
    {
        return chosen;
    }

    for &r in resolutions.iter().rev() {
        if range / r as i64 <= max_points {
            return r;
        }
    }

    largest
}

/// Nearest-rank percentile: value at rank `ceil(q * len)` of the sorted list.
/// `None` when the sample list is empty (skipped, never an error).
pub fn percentile(values: &[f64], quantile: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (quantile * sorted.len() as f64).ceil() as usize;
    let idx = rank.clamp(1, sorted.len()) - 1;
    Some(sorted[idx])
}

/// Per-route latency percentile series; buckets without samples are skipped.
pub fn latency_series(grid: &BucketGrid, quantile: f64) -> Vec<Series<f64>> {
    let mut per_route: IndexMap<String, Vec<(i64, f64)>> = IndexMap::new();

    for (&ts, routes) in grid {
        for (route, bucket) in routes {
            if let Some(p) = percentile(&bucket.latencies, quantile) {
                per_route.entry(route.clone()).or_default().push((ts, p));
            }
        }
    }

    per_route
        .into_iter()
        .map(|(name, data)| Series { name, data })
        .collect()
}

/// One series per status class (`1XX`..`5XX`), counts summed across routes
/// per bucket timestamp. Classes with no observations yield empty series.
pub fn status_code_series(grid: &BucketGrid) -> Vec<Series<u64>> {
    let mut grouped: IndexMap<StatusClass, Vec<(i64, u64)>> = StatusClass::ALL
        .into_iter()
        .map(|class| (class, Vec::new()))
        .collect();

    for (&ts, routes) in grid {
        let mut per_class: IndexMap<StatusClass, u64> = IndexMap::new();
        for bucket in routes.values() {
            for (&class, &n) in &bucket.status_codes {
                *per_class.entry(class).or_default() += n;
            }
        }
        for (class, n) in per_class {
            if let Some(points) = grouped.get_mut(&class) {
                points.push((ts, n));
            }
        }
    }

    grouped
        .into_iter()
        .map(|(class, data)| Series {
            name: class.as_str().to_string(),
            data,
        })
        .collect()
}

/// Read/write split summed across routes per bucket timestamp.
pub fn read_write_series(grid: &BucketGrid) -> Vec<Series<u64>> {
    let mut reads = Vec::with_capacity(grid.len());
    let mut writes = Vec::with_capacity(grid.len());

    for (&ts, routes) in grid {
        let mut read = 0;
        let mut write = 0;
        for bucket in routes.values() {
            read += bucket.rw_count.read;
            write += bucket.rw_count.write;
        }
        reads.push((ts, read));
        writes.push((ts, write));
    }

    vec![
        Series {
            name: "Read".to_string(),
            data: reads,
        },
        Series {
            name: "Write".to_string(),
            data: writes,
        },
    ]
}

/// Top `limit` routes by summed call count, descending. Ties keep first-seen
/// order (stable sort over insertion-ordered accumulation).
pub fn top_routes(grid: &BucketGrid, limit: usize) -> Vec<(String, u64)> {
    let mut totals: IndexMap<String, u64> = IndexMap::new();
    for routes in grid.values() {
        for (route, bucket) in routes {
            *totals.entry(route.clone()).or_default() += bucket.count;
        }
    }

    let mut out: Vec<(String, u64)> = totals.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1));
    out.truncate(limit);
    out
}

/// Top `limit` routes by mean latency over all samples across all buckets in
/// range, descending. Routes with no latency samples are skipped.
pub fn top_slowest_routes(grid: &BucketGrid, limit: usize) -> Vec<(String, f64)> {
    let mut sums: IndexMap<String, (f64, usize)> = IndexMap::new();
    for routes in grid.values() {
        for (route, bucket) in routes {
            let acc = sums.entry(route.clone()).or_insert((0.0, 0));
            acc.0 += bucket.latencies.iter().sum::<f64>();
            acc.1 += bucket.latencies.len();
        }
    }

    let mut out: Vec<(String, f64)> = sums
        .into_iter()
        .filter(|(_, (_, n))| *n > 0)
        .map(|(route, (sum, n))| (route, sum / n as f64))
        .collect();
    out.sort_by(|a, b| b.1.total_cmp(&a.1));
    out.truncate(limit);
    out
}

/// Top `limit` routes by summed error count, descending.
pub fn top_error_prone_routes(grid: &BucketGrid, limit: usize) -> Vec<(String, u64)> {
    let mut totals: IndexMap<String, u64> = IndexMap::new();
    for routes in grid.values() {
        for (route, bucket) in routes {
            *totals.entry(route.clone()).or_default() += bucket.errors;
        }
    }

    let mut out: Vec<(String, u64)> = totals.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1));
    out.truncate(limit);
    out
}

/// Method histograms summed across all routes and buckets.
pub fn requests_per_method(grid: &BucketGrid) -> std::collections::BTreeMap<String, u64> {
    let mut counts = std::collections::BTreeMap::new();
    for routes in grid.values() {
        for bucket in routes.values() {
            for (method, &n) in &bucket.methods {
                *counts.entry(method.clone()).or_default() += n;
            }
        }
    }
    counts
}

/// Per-route tabular overview plus grid maxima of p99 latency and error rate.
pub fn table_overview(grid: &BucketGrid, bucket_size: u32) -> TableOverview {
    struct RowAcc {
        last_called: i64,
        count: u64,
        errors: u64,
        rpm_points: Vec<f64>,
        rps_points: Vec<f64>,
        latencies: Vec<f64>,
    }

    let mut acc: IndexMap<String, RowAcc> = IndexMap::new();

    for (&ts, routes) in grid {
        for (route, bucket) in routes {
            let row = acc.entry(route.clone()).or_insert_with(|| RowAcc {
                last_called: ts,
                count: 0,
                errors: 0,
                rpm_points: Vec::new(),
                rps_points: Vec::new(),
                latencies: Vec::new(),
            });
            row.last_called = row.last_called.max(ts);
            row.count += bucket.count;
            row.errors += bucket.errors;
            row.rpm_points
                .push(60.0 * bucket.count as f64 / bucket_size as f64);
            row.rps_points.push(bucket.count as f64 / bucket_size as f64);
            row.latencies.extend_from_slice(&bucket.latencies);
        }
    }

    let mut rows = Vec::with_capacity(acc.len());
    let mut max_p99_latency: f64 = 0.0;
    let mut max_error_rate: f64 = 0.0;

    for (route, row) in acc {
        let error_rate = if row.count > 0 {
            row.errors as f64 * 100.0 / row.count as f64
        } else {
            0.0
        };
        let p99_latency = percentile(&row.latencies, LATENCY_QUANTILE).unwrap_or(0.0);

        max_p99_latency = max_p99_latency.max(p99_latency);
        max_error_rate = max_error_rate.max(error_rate);

        rows.push(TableRow {
            route,
            last_called: row.last_called,
            total_call_count: row.count,
            total_errors_count: row.errors,
            error_rate,
            requests_per_minute: mean(&row.rpm_points),
            throughput_rps: mean(&row.rps_points),
            p99_latency,
        });
    }

    let total = rows.len();
    TableOverview {
        rows,
        max_p99_latency,
        max_error_rate,
        total,
    }
}

fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / (v.len() as f64)
}

/// Checks whether a bucket at `start` with the given size intersects
/// `[ts_from, ts_to]`.
pub fn bucket_in_range(start: i64, bucket_size: u32, ts_from: i64, ts_to: i64) -> bool {
    start + bucket_size as i64 > ts_from && start <= ts_to
}
