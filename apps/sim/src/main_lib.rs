use std::sync::Arc;

use futures::future::try_join_all;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use winsync_backend_memory::MemoryBackend;
use winsync_core::store::{EntityStoreClient, ListFilter};
use winsync_core::{Model, ModelKind, SyncConfig, SyncEngine, WindowId};

use crate::config::Config;

pub fn init_tracing() {
    let log_format = std::env::var("WINSYNC_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn sync_config(config: &Config) -> SyncConfig {
    SyncConfig::default().with_debounce(config.debounce)
}

/// Opens `config.windows` windows labelled `main_0`, `main_1`, ...
pub async fn open_windows(
    config: &Config,
    backend: &Arc<MemoryBackend>,
) -> anyhow::Result<Vec<SyncEngine>> {
    let windows = try_join_all((0..config.windows).map(|n| {
        let store = Arc::clone(backend) as Arc<dyn EntityStoreClient>;
        SyncEngine::start(
            WindowId::new(format!("main_{}", n)),
            store,
            backend.as_ref(),
            sync_config(config),
        )
    }))
    .await?;
    tracing::info!("Opened {} windows", windows.len());
    Ok(windows)
}

/// Per-window disagreement with the backend, one line per difference.
pub async fn divergences(
    backend: &MemoryBackend,
    windows: &[SyncEngine],
) -> anyhow::Result<Vec<String>> {
    let mut found = Vec::new();
    for kind in ModelKind::ALL {
        let authoritative = backend.list(kind, &ListFilter::All).await?;
        for window in windows {
            let cached = window.reconciler().read_all(kind);
            if cached.len() != authoritative.len() {
                found.push(format!(
                    "[{}] {}: {} cached, {} stored",
                    window.window_id(),
                    kind,
                    cached.len(),
                    authoritative.len()
                ));
            }
            for stored in &authoritative {
                match window.reconciler().read(kind, stored.id()) {
                    Some(value) if value == *stored => {}
                    Some(_) => found.push(format!(
                        "[{}] {} {} is out of date",
                        window.window_id(),
                        kind,
                        stored.id()
                    )),
                    None => found.push(format!(
                        "[{}] {} {} is missing",
                        window.window_id(),
                        kind,
                        stored.id()
                    )),
                }
            }
        }
    }
    Ok(found)
}
