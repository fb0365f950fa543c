mod config;
mod main_lib;
mod scenario;

use std::sync::Arc;

use config::Config;
use main_lib::{divergences, init_tracing, open_windows};
use scenario::run_script;
use winsync_backend_memory::MemoryBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing();
    tracing::info!(
        "Starting {} windows (debounce {:?}, event capacity {})",
        config.windows,
        config.debounce,
        config.event_capacity
    );

    let backend = Arc::new(MemoryBackend::new(config.event_capacity));
    let windows = open_windows(&config, &backend).await?;

    let report = run_script(&backend, &windows).await?;
    tracing::info!(
        "Script issued {} writes, pruned {} responses; waiting {:?} to settle",
        report.writes,
        report.pruned,
        config.settle
    );
    tokio::time::sleep(config.settle).await;

    let stale: Vec<String> = windows
        .iter()
        .filter(|w| w.is_stale())
        .map(|w| w.window_id().to_string())
        .collect();
    if !stale.is_empty() {
        tracing::warn!("Windows lost their change stream: {}", stale.join(", "));
    }

    let found = divergences(&backend, &windows).await?;
    for engine in &windows {
        engine.shutdown();
    }
    if !found.is_empty() {
        for line in &found {
            tracing::error!("{}", line);
        }
        anyhow::bail!("Windows diverged from the backend in {} places", found.len());
    }

    tracing::info!("All {} windows converged", windows.len());
    Ok(())
}
