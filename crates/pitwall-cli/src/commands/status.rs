//! Status command handler

use anyhow::{Context, Result};

use pitwall_core::{Config, SnapshotPersistence};

use crate::output::{Output, OutputFormat};

/// Show the local snapshot status
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let persistence = SnapshotPersistence::new(config.clone());
    let snapshot = persistence.load().context("Failed to load snapshot")?;
    let remote_id = persistence
        .load_remote_id()
        .context("Failed to read remote id")?;

    match output.format {
        OutputFormat::Json => {
            let body = match &snapshot {
                Some(s) => serde_json::json!({
                    "version": s.version,
                    "last_updated_by": s.last_updated_by,
                    "members": s.members.len(),
                    "tasks": s.tasks.len(),
                    "transactions": s.transactions.len(),
                    "sponsors": s.sponsors.len(),
                    "news": s.news.len(),
                    "sim_results": s.sim_results.len(),
                    "remote_id": remote_id,
                    "snapshot_path": config.snapshot_path(),
                }),
                None => serde_json::json!({
                    "version": null,
                    "remote_id": remote_id,
                    "snapshot_path": config.snapshot_path(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&body).unwrap());
        }
        OutputFormat::Quiet => {
            if let Some(s) = &snapshot {
                println!("{}", s.version);
            }
        }
        OutputFormat::Human => match &snapshot {
            Some(s) => {
                println!("Snapshot:  v{}", s.version);
                if let Some(who) = &s.last_updated_by {
                    println!("Edited by: {}", who.name);
                }
                println!(
                    "Contents:  {} member(s), {} task(s), {} transaction(s)",
                    s.members.len(),
                    s.tasks.len(),
                    s.transactions.len()
                );
                println!(
                    "           {} sponsor(s), {} news post(s), {} sim result(s)",
                    s.sponsors.len(),
                    s.news.len(),
                    s.sim_results.len()
                );
                println!(
                    "Relay:     {}",
                    remote_id.as_deref().unwrap_or("(not pushed)")
                );
                println!("File:      {}", config.snapshot_path().display());
            }
            None => {
                println!("No snapshot yet.");
                println!("File would be: {}", config.snapshot_path().display());
            }
        },
    }

    Ok(())
}
