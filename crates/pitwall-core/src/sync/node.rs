//! Node watchdog
//!
//! Runs in every non-Manager context. Tracks the last-seen hub signal,
//! flips the connection status to searching once the Hub has been silent
//! for longer than the timeout, and asks for a full resync whenever it
//! (re)connects. Incoming snapshots are applied through the version rule
//! in either state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::bus::Bus;
use super::message::BusMessage;
use super::service::{ConnectionStatus, SyncLogEvent};
use crate::store::StoreService;

/// Timing configuration for the watchdog task
#[derive(Debug, Clone)]
pub struct WatchdogTaskConfig {
    /// How long the Hub may stay silent before the connection counts as
    /// lost; must exceed the Hub's broadcast period or normal jitter
    /// trips it
    pub timeout: Duration,
    /// Delay before the first state request, so the bus subscription is
    /// in place before anyone replies
    pub request_delay: Duration,
}

/// Handle to a running watchdog task
pub struct NodeHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl NodeHandle {
    /// Stop the watchdog and clear its timer
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

/// Spawn the watchdog task for this context
///
/// The task owns the status transitions between `Searching` and
/// `Connected`; it starts in `Searching`.
pub fn spawn_watchdog_task(
    config: WatchdogTaskConfig,
    store: Arc<StoreService>,
    bus: Arc<dyn Bus>,
    status_tx: watch::Sender<ConnectionStatus>,
    log_tx: broadcast::Sender<SyncLogEvent>,
) -> NodeHandle {
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let task = tokio::spawn(watchdog_task_loop(
        config,
        store,
        bus,
        status_tx,
        shutdown_rx,
        log_tx,
    ));

    NodeHandle { shutdown_tx, task }
}

async fn watchdog_task_loop(
    config: WatchdogTaskConfig,
    store: Arc<StoreService>,
    bus: Arc<dyn Bus>,
    status_tx: watch::Sender<ConnectionStatus>,
    mut shutdown_rx: mpsc::Receiver<()>,
    log_tx: broadcast::Sender<SyncLogEvent>,
) {
    let mut rx = bus.subscribe(store.instance());
    let _ = status_tx.send(ConnectionStatus::Searching);

    // Initial state request, delayed so the subscription above is live
    // before the Hub's reply can race past it.
    tokio::select! {
        _ = shutdown_rx.recv() => return,
        _ = tokio::time::sleep(config.request_delay) => {
            bus.publish(
                store.instance(),
                BusMessage::request_state(store.instance().clone()),
            );
            let _ = log_tx.send(SyncLogEvent::StateRequested);
        }
    }

    let mut deadline = Instant::now() + config.timeout;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,

            _ = tokio::time::sleep_until(deadline) => {
                if *status_tx.borrow() == ConnectionStatus::Connected {
                    warn!(timeout = ?config.timeout, "connection lost: hub went silent");
                    let _ = status_tx.send(ConnectionStatus::Searching);
                    let _ = log_tx.send(SyncLogEvent::ConnectionLost);
                }
                deadline = Instant::now() + config.timeout;
            }

            msg = rx.recv() => {
                let Some(msg) = msg else { break };

                let hub_id = match &msg {
                    BusMessage::HubHeartbeat { hub_id, .. } => Some(hub_id.clone()),
                    BusMessage::SyncUpdate { hub_id, .. } => Some(hub_id.clone()),
                    // Traffic between other Nodes and the Hub says
                    // nothing about liveness for us.
                    _ => None,
                };

                if let Some(hub_id) = hub_id {
                    deadline = Instant::now() + config.timeout;

                    if *status_tx.borrow() == ConnectionStatus::Searching {
                        info!(hub = %hub_id, "connected to hub");
                        let _ = status_tx.send(ConnectionStatus::Connected);
                        let _ = log_tx.send(SyncLogEvent::Connected { hub_id });

                        // The first signal may have been a bare heartbeat
                        // with no state attached; ask for a full snapshot.
                        bus.publish(
                            store.instance(),
                            BusMessage::request_state(store.instance().clone()),
                        );
                        let _ = log_tx.send(SyncLogEvent::StateRequested);
                    }
                }

                if let BusMessage::SyncUpdate { payload, .. } = msg {
                    let version = payload.version;
                    if store.apply_remote(payload).await {
                        debug!(%version, "snapshot applied");
                        let _ = log_tx.send(SyncLogEvent::SnapshotApplied { version });
                    } else {
                        debug!(%version, "stale snapshot discarded");
                        let _ = log_tx.send(SyncLogEvent::StaleSnapshotDiscarded { version });
                    }
                }
            }
        }
    }

    let _ = status_tx.send(ConnectionStatus::Searching);
}
