use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub metrics: MetricsConfig,
    pub sampling: SamplingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Which persistence backend backs the store. Wrong/unknown values fail at
/// config parse time, not at first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub backend: BackendKind,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Bucket sizes in seconds, finest first.
    #[serde(default = "default_resolutions")]
    pub resolutions: Vec<u32>,
    /// Buckets older than this are evicted; unset means unbounded retention.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    #[serde(default = "default_max_latency_samples")]
    pub max_latency_samples: usize,
}

fn default_db_path() -> String {
    "data/metrics.db".into()
}

fn default_resolutions() -> Vec<u32> {
    vec![5, 30, 300, 900]
}

fn default_max_latency_samples() -> usize {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    /// How often to probe process/system metrics.
    #[serde(default = "default_sample_interval_ms")]
    pub interval_ms: u64,
    /// How often the retention reaper runs.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_sample_interval_ms() -> u64 {
    5_000
}

fn default_cleanup_interval_secs() -> u64 {
    60 * 60
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.metrics.resolutions.is_empty(),
            "metrics.resolutions must list at least one bucket size"
        );
        anyhow::ensure!(
            self.metrics.resolutions.iter().all(|&r| r > 0),
            "metrics.resolutions entries must be > 0"
        );
        anyhow::ensure!(
            self.metrics
                .resolutions
                .windows(2)
                .all(|w| w[0] < w[1]),
            "metrics.resolutions must be strictly ascending"
        );
        if self.metrics.backend == BackendKind::Sqlite {
            anyhow::ensure!(
                !self.metrics.db_path.is_empty(),
                "metrics.db_path must be non-empty for the sqlite backend"
            );
        }
        if let Some(ttl) = self.metrics.ttl_secs {
            anyhow::ensure!(ttl > 0, "metrics.ttl_secs must be > 0 when set, got {}", ttl);
        }
        anyhow::ensure!(
            self.metrics.max_latency_samples > 0,
            "metrics.max_latency_samples must be > 0, got {}",
            self.metrics.max_latency_samples
        );
        anyhow::ensure!(
            self.sampling.interval_ms > 0,
            "sampling.interval_ms must be > 0, got {}",
            self.sampling.interval_ms
        );
        anyhow::ensure!(
            self.sampling.cleanup_interval_secs > 0,
            "sampling.cleanup_interval_secs must be > 0, got {}",
            self.sampling.cleanup_interval_secs
        );
        Ok(())
    }
}
