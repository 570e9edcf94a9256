//! Push and pull command handlers
//!
//! Manual relay actions. Unlike the background poller these always hit
//! the network and surface their errors to the user.

use std::sync::Arc;

use anyhow::{Context, Result};

use pitwall_core::relay::{CloudRelay, HttpBlobStore};
use pitwall_core::{Config, LocalBus, SnapshotPersistence, StoreService};

use crate::output::Output;

fn open_relay(config: &Config) -> Result<CloudRelay> {
    let url = config.relay_url.clone().context(
        "Relay URL is not configured. Set one with: pitwall config set relay_url <url>",
    )?;
    Ok(CloudRelay::new(Arc::new(HttpBlobStore::new(url))))
}

/// Push the local snapshot to the cloud relay
pub async fn push(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let relay = open_relay(&config)?;
    let persistence = SnapshotPersistence::new(config);

    let snapshot = persistence.load_or_seed();
    let existing = persistence
        .load_remote_id()
        .context("Failed to read remote id")?;

    let id = relay
        .push(&snapshot, existing.as_deref())
        .await
        .context("Failed to push snapshot to relay")?;

    if existing.is_none() {
        persistence
            .save_remote_id(&id)
            .context("Failed to persist remote id")?;
    }

    output.success(&format!("Pushed v{} as {}", snapshot.version, id));
    Ok(())
}

/// Pull the relay snapshot and apply it if equal or newer
pub async fn pull(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let relay = open_relay(&config)?;
    let persistence = SnapshotPersistence::new(config.clone());

    let remote_id = persistence
        .load_remote_id()
        .context("Failed to read remote id")?
        .context("No remote id recorded. Push first, or copy one from another device.")?;

    let remote = relay
        .pull(&remote_id)
        .await
        .context("Failed to pull snapshot from relay")?;
    let remote_version = remote.version;

    // Route through the store so the version rule and persistence apply
    let store = StoreService::new(config, LocalBus::new());
    if store.apply_remote(remote).await {
        output.success(&format!("Pulled v{}", remote_version));
    } else {
        output.message(&format!(
            "Remote v{} is older than local v{}; kept local state",
            remote_version,
            store.version().await
        ));
    }
    Ok(())
}
