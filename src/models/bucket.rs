// Per-route request statistics within one time bucket

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Methods counted as reads in the read/write split.
const READ_METHODS: [&str; 3] = ["GET", "HEAD", "OPTIONS"];

/// HTTP status class. Statuses outside 100-599 clamp to the nearest class.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum StatusClass {
    #[serde(rename = "1XX")]
    Informational,
    #[serde(rename = "2XX")]
    Success,
    #[serde(rename = "3XX")]
    Redirect,
    #[serde(rename = "4XX")]
    ClientError,
    #[serde(rename = "5XX")]
    ServerError,
}

impl StatusClass {
    pub const ALL: [StatusClass; 5] = [
        StatusClass::Informational,
        StatusClass::Success,
        StatusClass::Redirect,
        StatusClass::ClientError,
        StatusClass::ServerError,
    ];

    pub fn of(status: u16) -> Self {
        match status / 100 {
            0 | 1 => StatusClass::Informational,
            2 => StatusClass::Success,
            3 => StatusClass::Redirect,
            4 => StatusClass::ClientError,
            _ => StatusClass::ServerError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::Informational => "1XX",
            StatusClass::Success => "2XX",
            StatusClass::Redirect => "3XX",
            StatusClass::ClientError => "4XX",
            StatusClass::ServerError => "5XX",
        }
    }
}

/// Read/write split: GET/HEAD/OPTIONS count as reads, everything else as writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RwCount {
    pub read: u64,
    pub write: u64,
}

/// Aggregated request statistics for one route within one fixed time window.
///
/// Invariant: `count == Σ status_codes == Σ methods == read + write`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bucket {
    pub latencies: Vec<f64>,
    pub count: u64,
    pub errors: u64,
    pub status_codes: BTreeMap<StatusClass, u64>,
    pub methods: BTreeMap<String, u64>,
    pub rw_count: RwCount,
}

impl Bucket {
    /// Applies one request event. Latency list is capped at `max_latency_samples`
    /// (oldest sample dropped first).
    pub fn observe(&mut self, duration: f64, status: u16, method: &str, max_latency_samples: usize) {
        self.latencies.push(duration);
        if self.latencies.len() > max_latency_samples {
            self.latencies.remove(0);
        }

        self.count += 1;

        if (400..600).contains(&status) {
            self.errors += 1;
        }

        *self.status_codes.entry(StatusClass::of(status)).or_insert(0) += 1;

        let method = method.to_uppercase();
        let rw = if READ_METHODS.contains(&method.as_str()) {
            &mut self.rw_count.read
        } else {
            &mut self.rw_count.write
        };
        *rw += 1;
        *self.methods.entry(method).or_insert(0) += 1;
    }
}

/// Start of the bucket containing `ts` at the given resolution:
/// `floor(ts / bucket_size) * bucket_size`.
pub fn bucket_start(ts: i64, bucket_size: u32) -> i64 {
    let size = bucket_size as i64;
    ts.div_euclid(size) * size
}
