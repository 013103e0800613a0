use anyhow::Result;
use pulsedash::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let store: Arc<dyn store::MetricsStore> = match app_config.metrics.backend {
        config::BackendKind::Memory => Arc::new(store::MemoryStore::new(
            &app_config.metrics.resolutions,
            app_config.metrics.ttl_secs,
            app_config.metrics.max_latency_samples,
        )?),
        config::BackendKind::Sqlite => {
            let sqlite = store::SqliteStore::connect(
                &app_config.metrics.db_path,
                &app_config.metrics.resolutions,
                app_config.metrics.ttl_secs,
                app_config.metrics.max_latency_samples,
            )
            .await?;
            sqlite.init().await?;
            Arc::new(sqlite)
        }
    };

    let engine = Arc::new(engine::MetricsEngine::new(store));
    let sysinfo_repo = Arc::new(sysinfo_repo::SysinfoRepo::new());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            engine: engine.clone(),
            sysinfo_repo,
            shutdown_rx,
        },
        worker::WorkerConfig {
            sample_interval_ms: app_config.sampling.interval_ms,
            cleanup_interval_secs: app_config.sampling.cleanup_interval_secs,
        },
    );

    let app = routes::app(engine);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = worker_handle.await;
        }
    }

    Ok(())
}
