// StatAggregator tests: aligned flush boundaries, lazy crossing, retention

use pulsedash::aggregator::StatAggregator;
use pulsedash::models::SystemLogEntry;

fn collect(agg: &mut StatAggregator, now: f64, value: f64) -> Vec<SystemLogEntry> {
    let mut flushed = Vec::new();
    agg.add_sample(now, value, |e| flushed.push(e));
    flushed
}

#[test]
fn no_flush_before_boundary() {
    let mut agg = StatAggregator::new(5, 100.0);
    assert!(collect(&mut agg, 100.5, 1.0).is_empty());
    assert!(collect(&mut agg, 102.0, 3.0).is_empty());
    assert!(collect(&mut agg, 104.9, 2.0).is_empty());
}

#[test]
fn flush_emits_min_max_avg_at_right_boundary() {
    let mut agg = StatAggregator::new(5, 100.0);
    collect(&mut agg, 100.5, 1.0);
    collect(&mut agg, 102.0, 3.0);
    collect(&mut agg, 104.0, 2.0);

    let flushed = collect(&mut agg, 105.5, 10.0);
    assert_eq!(flushed.len(), 1);
    let entry = flushed[0];
    assert_eq!(entry.timestamp, 105);
    assert_eq!(entry.min, 1.0);
    assert_eq!(entry.max, 3.0);
    assert_eq!(entry.avg, 2.0);
    assert!(entry.min <= entry.avg && entry.avg <= entry.max);
    // Right boundary is always a multiple of the bucket size.
    assert_eq!(entry.timestamp % 5, 0);
}

#[test]
fn avg_is_rounded_to_two_decimals() {
    let mut agg = StatAggregator::new(5, 100.0);
    collect(&mut agg, 100.5, 1.0);
    collect(&mut agg, 101.0, 1.0);
    collect(&mut agg, 102.0, 2.0);
    let flushed = collect(&mut agg, 105.0, 0.0);
    assert_eq!(flushed.len(), 1);
    // 4/3 rounds to 1.33
    assert_eq!(flushed[0].avg, 1.33);
}

#[test]
fn empty_window_advances_without_emitting() {
    let mut agg = StatAggregator::new(5, 100.0);
    // Crosses the boundary at 105 but the window [100, 105) holds no samples.
    assert!(collect(&mut agg, 107.0, 1.0).is_empty());

    // Next add crosses 110; window [105, 110) holds the sample from 107.
    let flushed = collect(&mut agg, 112.0, 2.0);
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].timestamp, 110);
    assert_eq!(flushed[0].min, 1.0);
    assert_eq!(flushed[0].max, 1.0);
}

#[test]
fn at_most_one_flush_per_add() {
    let mut agg = StatAggregator::new(5, 100.0);
    // Jumps three boundaries ahead; only the first pending boundary flushes.
    let flushed = collect(&mut agg, 118.0, 1.0);
    assert!(flushed.is_empty()); // window [100, 105) was empty
}

#[test]
fn boundary_alignment_ignores_call_jitter() {
    let mut agg = StatAggregator::new(30, 1_754_763_422.0);
    collect(&mut agg, 1_754_763_425.3, 4.0);
    let flushed = collect(&mut agg, 1_754_763_451.7, 5.0);
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].timestamp % 30, 0);
    assert_eq!(flushed[0].timestamp, 1_754_763_450);
}

#[test]
fn samples_older_than_two_windows_are_discarded() {
    let mut agg = StatAggregator::new(5, 0.0);
    collect(&mut agg, 1.0, 1.0);
    collect(&mut agg, 2.0, 2.0);
    collect(&mut agg, 5.0, 3.0); // flushes [0, 5)
    collect(&mut agg, 10.0, 4.0); // flushes [5, 10), cutoff 0
    assert_eq!(agg.sample_count(), 4);

    collect(&mut agg, 15.0, 5.0); // flushes [10, 15), cutoff 5 drops t=1,2
    assert_eq!(agg.sample_count(), 3);
}

#[test]
fn flush_at_empty_window_only_advances() {
    let mut agg = StatAggregator::new(5, 100.0);
    let mut flushed = Vec::new();
    agg.flush_at(105.0, |e| flushed.push(e));
    assert!(flushed.is_empty());
}
