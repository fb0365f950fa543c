//! Scripted multi-window session.
//!
//! Writes are spread across windows round-robin so every window sees a mix
//! of its own echoes and other windows' changes.

use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;
use winsync_backend_memory::MemoryBackend;
use winsync_core::workspaces::NewWorkspace;
use winsync_core::{ModelKind, SyncEngine};

/// Summary of what the script wrote.
#[derive(Debug, Default)]
pub struct ScriptReport {
    pub writes: usize,
    pub pruned: usize,
}

pub async fn run_script(
    backend: &MemoryBackend,
    windows: &[SyncEngine],
) -> anyhow::Result<ScriptReport> {
    let Some(first) = windows.first() else {
        anyhow::bail!("No windows to drive");
    };
    let window = |n: usize| &windows[n % windows.len()];
    let mut report = ScriptReport::default();

    let workspace = first
        .create_workspace(NewWorkspace {
            name: "Sandbox".to_string(),
            description: "Shared by every window".to_string(),
        })
        .await?;
    report.writes += 1;
    tracing::info!("[{}] Created workspace {}", first.window_id(), workspace.id);

    let mut requests = Vec::new();
    for (n, engine) in windows.iter().enumerate() {
        let request = engine
            .create_request(&workspace.id, &format!("Request {}", n))
            .await?;
        report.writes += 1;
        requests.push(request);
    }

    // A burst of renames from one window; other windows apply only the last.
    let renamer = window(windows.len() - 1);
    for n in 1..=5 {
        renamer
            .update(
                ModelKind::Workspace,
                &workspace.id,
                json!({"name": format!("Sandbox v{}", n)}),
            )
            .await?;
        report.writes += 1;
        sleep(Duration::from_millis(20)).await;
    }

    // The backend streams a response in; every update reaches every window.
    let target = &requests[0];
    for attempt in 0..3 {
        let response = backend.record_response(&target.id, json!({"status": 0}))?;
        for elapsed in [10, 20, 30] {
            backend.update_response(
                &response.id,
                json!({"elapsed": elapsed + attempt * 100}),
            )?;
        }
        backend.update_response(&response.id, json!({"status": 200}))?;
        report.writes += 5;
    }
    report.pruned = backend.prune_responses(&target.id, 1)?;

    for (n, engine) in windows.iter().enumerate() {
        engine
            .set_key_value(None, &["sidebar", "width"], &(250 + n * 10))
            .await?;
        report.writes += 1;
    }

    if requests.len() > 1 {
        let doomed = &requests[1];
        window(1).delete(ModelKind::HttpRequest, &doomed.id).await?;
        report.writes += 1;
        tracing::info!("[{}] Deleted request {}", window(1).window_id(), doomed.id);
    }

    Ok(report)
}
