//! Task command handlers
//!
//! One-shot mutations go through the store dispatcher, so every edit
//! bumps the version and lands on disk exactly like an edit made inside
//! a running sync participant.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use pitwall_core::{Attribution, Config, LocalBus, StoreService, Task};

use crate::output::Output;

fn open_store() -> Result<Arc<StoreService>> {
    let config = Config::load().context("Failed to load configuration")?;
    Ok(StoreService::new(config, LocalBus::new()))
}

/// Create a new task
pub async fn create(title: String, bounty: Option<u32>, output: &Output) -> Result<()> {
    let store = open_store()?;

    let mut task = Task::new(title);
    if let Some(points) = bounty {
        task = task.with_bounty(points);
    }
    let shown = task.clone();

    let version = store.update(move |s| s.tasks.push(task), None).await;

    output.print_task(&shown);
    output.success(&format!("Task created (snapshot v{})", version));
    Ok(())
}

/// List all tasks
pub fn list(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let persistence = pitwall_core::SnapshotPersistence::new(config);
    let snapshot = persistence.load_or_seed();

    output.print_tasks(&snapshot.tasks);
    Ok(())
}

/// Claim a task's bounty
pub async fn claim(id: String, by: String, output: &Output) -> Result<()> {
    let store = open_store()?;
    let task_id = resolve_task_id(&store, &id).await?;

    let claimer = by.clone();
    let attribution = Attribution::new(store.instance().as_str(), by.clone());
    let version = store
        .update(
            move |s| {
                if let Some(task) = s.tasks.iter_mut().find(|t| t.id == task_id) {
                    task.claim(claimer);
                }
            },
            Some(attribution),
        )
        .await;

    output.success(&format!("Task claimed by {} (snapshot v{})", by, version));
    Ok(())
}

/// Mark a task done
pub async fn done(id: String, output: &Output) -> Result<()> {
    let store = open_store()?;
    let task_id = resolve_task_id(&store, &id).await?;

    let version = store
        .update(
            move |s| {
                if let Some(task) = s.tasks.iter_mut().find(|t| t.id == task_id) {
                    task.complete();
                }
            },
            None,
        )
        .await;

    output.success(&format!("Task done (snapshot v{})", version));
    Ok(())
}

/// Resolve a full UUID or unique prefix to a task id
async fn resolve_task_id(store: &StoreService, id: &str) -> Result<Uuid> {
    let snapshot = store.snapshot().await;
    let matches: Vec<&Task> = snapshot
        .tasks
        .iter()
        .filter(|t| t.id.to_string().starts_with(id))
        .collect();

    match matches.as_slice() {
        [task] => Ok(task.id),
        [] => bail!("No task found matching '{}'", id),
        _ => bail!("Multiple tasks match '{}'. Use a longer prefix.", id),
    }
}
