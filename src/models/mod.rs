// Domain models: request buckets, system metric entries, wire payloads

mod bucket;
mod payload;
mod system;

pub use bucket::{Bucket, RwCount, StatusClass, bucket_start};
pub use payload::{MetricsPayload, Series, SystemMetricsPayload, TableOverview, TableRow};
pub use system::{SystemLogEntry, SystemMetricKey, SystemSample};
