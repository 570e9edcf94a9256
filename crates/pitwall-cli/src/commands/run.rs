//! Run command handler
//!
//! Starts a live sync participant: the store, the role's protocol task,
//! and (when configured) the cloud relay poller, then streams connection
//! events to the terminal until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use pitwall_core::relay::{spawn_relay_task, CloudRelay, HttpBlobStore};
use pitwall_core::sync::SyncService;
use pitwall_core::{Config, ConnectionStatus, LocalBus, Role, StoreService};

use crate::output::Output;

pub async fn run(role: Role, output: &Output) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pitwall_core=info,pitwall_cli=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();

    let config = Config::load().context("Failed to load configuration")?;
    let bus = LocalBus::new();
    let store = StoreService::new(config.clone(), bus.clone());
    let sync = SyncService::new(config.clone(), store.clone(), bus);

    output.message(&format!(
        "instance {} at snapshot v{}",
        store.instance(),
        store.version().await
    ));

    sync.set_role(role).await;

    let relay_handle = match (&config.relay_url, config.relay_enabled) {
        (Some(url), true) => {
            let relay = Arc::new(CloudRelay::new(Arc::new(HttpBlobStore::new(url.clone()))));
            Some(spawn_relay_task(
                config.clone(),
                config.relay_poll_interval(),
                relay,
                store.clone(),
            ))
        }
        _ => None,
    };

    let mut status_rx = sync.subscribe_status();
    let mut log_rx = sync.subscribe_log();
    output.message(&format!("status: {}", status_name(sync.status())));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *status_rx.borrow();
                output.message(&format!("status: {}", status_name(status)));
            }

            event = log_rx.recv() => match event {
                Ok(event) => output.message(&format!("{}", event)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    sync.shutdown().await;
    if let Some(handle) = relay_handle {
        handle.shutdown().await;
    }
    output.message("stopped");
    Ok(())
}

fn status_name(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Searching => "searching",
        ConnectionStatus::Connected => "connected",
        ConnectionStatus::Hosting => "hosting",
    }
}
