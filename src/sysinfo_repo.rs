// Process/system probe via sysinfo

use std::sync::Arc;
use sysinfo::{Networks, Pid, ProcessesToUpdate, System};
use tracing::instrument;

use crate::models::SystemSample;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub struct SysinfoRepo {
    sys: Arc<std::sync::Mutex<System>>,
    networks: Arc<std::sync::Mutex<Networks>>,
    pid: Option<Pid>,
}

impl Default for SysinfoRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoRepo {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        let networks = Networks::new_with_refreshed_list();
        Self {
            sys: Arc::new(std::sync::Mutex::new(sys)),
            networks: Arc::new(std::sync::Mutex::new(networks)),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Reads one sample of all tracked metrics: process CPU%, process RSS,
    /// memory availability and cumulative network byte counters.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "read_sample"))]
    pub async fn read_sample(&self) -> anyhow::Result<SystemSample> {
        let sys = self.sys.clone();
        let networks = self.networks.clone();
        let pid = self.pid;

        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            sys.refresh_memory();

            let (rss_bytes, cpu_percent) = match pid {
                Some(pid) => {
                    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                    match sys.process(pid) {
                        Some(p) => (p.memory(), p.cpu_usage() as f64),
                        None => (0, 0.0),
                    }
                }
                None => (0, 0.0),
            };

            let total = sys.total_memory();
            let available = sys.available_memory();
            let memory_percent = if total > 0 {
                (rss_bytes as f64 / total as f64) * 100.0
            } else {
                0.0
            };

            let mut networks = networks
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo networks lock poisoned: {}", e))?;
            networks.refresh(true);
            let mut sent: u64 = 0;
            let mut recv: u64 = 0;
            for (_name, data) in networks.list() {
                sent += data.total_transmitted();
                recv += data.total_received();
            }

            Ok(SystemSample {
                cpu_percent: (cpu_percent * 100.0).round() / 100.0,
                memory_percent,
                memory_used_mb: rss_bytes as f64 / BYTES_PER_MB,
                memory_available_mb: available as f64 / BYTES_PER_MB,
                network_io_sent: sent as f64,
                network_io_recv: recv as f64,
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}
