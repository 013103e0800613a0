// Streaming min/max/avg aggregation into fixed-size, aligned time windows.
// Flush boundaries are always multiples of the bucket size regardless of
// call timing jitter; the boundary check is lazy (runs on add, not a timer).

use crate::models::SystemLogEntry;
use std::collections::VecDeque;

/// Reduces a stream of `(timestamp, value)` samples into one min/max/avg
/// summary per completed window. Callers pass the flush sink per call so
/// backends can persist under their own locking.
#[derive(Debug)]
pub struct StatAggregator {
    bucket_size: u32,
    samples: VecDeque<(f64, f64)>,
    last_flush: f64,
}

impl StatAggregator {
    pub fn new(bucket_size: u32, now: f64) -> Self {
        let mut agg = Self {
            bucket_size,
            samples: VecDeque::new(),
            last_flush: 0.0,
        };
        agg.last_flush = agg.aligned(now);
        agg
    }

    pub fn bucket_size(&self) -> u32 {
        self.bucket_size
    }

    /// Timestamp aligned down to the nearest bucket boundary.
    fn aligned(&self, ts: f64) -> f64 {
        let size = self.bucket_size as i64;
        ((ts as i64).div_euclid(size) * size) as f64
    }

    /// Records a sample, flushing at most one window if `now` has crossed the
    /// next aligned boundary since the last flush.
    pub fn add_sample(&mut self, now: f64, value: f64, on_flush: impl FnMut(SystemLogEntry)) {
        self.samples.push_back((now, value));

        let next_flush = self.aligned(self.last_flush) + self.bucket_size as f64;
        if now >= next_flush {
            self.flush_at(next_flush, on_flush);
        }
    }

    /// Flushes the window ending at `boundary`: emits min/max/avg of samples in
    /// `[boundary - bucket_size, boundary)`, or only advances `last_flush` when
    /// the window is empty. Samples older than two windows are discarded.
    pub fn flush_at(&mut self, boundary: f64, mut on_flush: impl FnMut(SystemLogEntry)) {
        let window_start = boundary - self.bucket_size as f64;
        let values: Vec<f64> = self
            .samples
            .iter()
            .filter(|(t, _)| *t >= window_start && *t < boundary)
            .map(|(_, v)| *v)
            .collect();

        if values.is_empty() {
            self.last_flush = boundary;
            return;
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = round2(values.iter().sum::<f64>() / values.len() as f64);

        on_flush(SystemLogEntry {
            timestamp: boundary as i64,
            min,
            max,
            avg,
        });

        let cutoff = boundary - 2.0 * self.bucket_size as f64;
        while let Some(&(t, _)) = self.samples.front() {
            if t >= cutoff {
                break;
            }
            self.samples.pop_front();
        }

        self.last_flush = boundary;
    }

    /// Raw samples currently retained (bounded at two windows after a flush).
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
