//! Hub service
//!
//! Runs only in the context holding the Manager role. The Hub announces
//! liveness on a short interval and rebroadcasts the full snapshot on a
//! longer one, whether or not anything changed; dropped messages are
//! corrected by the next periodic tick, which bounds staleness to one
//! broadcast period while a Hub is alive.
//!
//! Nothing enforces Hub uniqueness. Two contexts that both believe they
//! are the Hub broadcast independently and Nodes resolve per the version
//! rule, which can diverge across Nodes during the conflict window. The
//! payload of every rebroadcast is the entire snapshot, so traffic grows
//! with total application data; both are accepted limits of this design.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::bus::Bus;
use super::message::BusMessage;
use super::service::SyncLogEvent;
use super::session::HubSession;
use crate::models::Attribution;
use crate::store::StoreService;

/// Timing configuration for the hub task
#[derive(Debug, Clone)]
pub struct HubTaskConfig {
    /// Heartbeat period (short, ~1s)
    pub heartbeat_period: Duration,
    /// Full-state broadcast period (longer, ~2s)
    pub broadcast_period: Duration,
}

/// Handle to a running hub task
pub struct HubHandle {
    session: HubSession,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl HubHandle {
    /// The session this activation runs under
    pub fn session(&self) -> &HubSession {
        &self.session
    }

    /// Stop the hub: timers die with the task, the hub session is
    /// cleared, and the context falls back to a Node-like participant.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

/// Spawn the hub task for this context
///
/// Generates a fresh hub session (so Nodes can detect the restart),
/// emits one heartbeat and one full broadcast immediately, then settles
/// into the periodic schedule.
pub fn spawn_hub_task(
    config: HubTaskConfig,
    store: Arc<StoreService>,
    bus: Arc<dyn Bus>,
    log_tx: broadcast::Sender<SyncLogEvent>,
) -> HubHandle {
    let session = HubSession::new(store.instance().clone());
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let task = tokio::spawn(hub_task_loop(
        config,
        session.clone(),
        store,
        bus,
        shutdown_rx,
        log_tx,
    ));

    HubHandle {
        session,
        shutdown_tx,
        task,
    }
}

async fn hub_task_loop(
    config: HubTaskConfig,
    session: HubSession,
    store: Arc<StoreService>,
    bus: Arc<dyn Bus>,
    mut shutdown_rx: mpsc::Receiver<()>,
    log_tx: broadcast::Sender<SyncLogEvent>,
) {
    let mut rx = bus.subscribe(store.instance());
    store.set_hub_session(Some(session.clone())).await;

    info!(session = %session, "hub active");
    let _ = log_tx.send(SyncLogEvent::HubActivated {
        session: session.id(),
    });

    // Interval timers complete their first tick immediately, which gives
    // already-listening Nodes an initial heartbeat and full broadcast
    // without waiting out a period.
    let mut heartbeat = tokio::time::interval(config.heartbeat_period);
    let mut broadcast = tokio::time::interval(config.broadcast_period);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,

            _ = heartbeat.tick() => {
                bus.publish(store.instance(), BusMessage::heartbeat(session.id()));
            }

            _ = broadcast.tick() => {
                let snapshot = store.snapshot().await;
                debug!(version = %snapshot.version, "periodic broadcast");
                bus.publish(
                    store.instance(),
                    BusMessage::sync_update(snapshot, session.id(), true),
                );
            }

            msg = rx.recv() => match msg {
                Some(BusMessage::RequestState { sender_id }) => {
                    // Out-of-band reply: join latency is bounded by the
                    // round trip, not the broadcast period.
                    let snapshot = store.snapshot().await;
                    debug!(requester = %sender_id, "serving state request");
                    bus.publish(
                        store.instance(),
                        BusMessage::sync_update(snapshot, session.id(), false),
                    );
                    let _ = log_tx.send(SyncLogEvent::StateServed { to: sender_id });
                }

                Some(BusMessage::BountyRequest { sender_id, task_id, claimed_by }) => {
                    // Forwarded writes take the standard dispatcher path:
                    // versioned, persisted, rebroadcast like a local edit.
                    let attribution = Attribution::new(sender_id.as_str(), claimed_by.clone());
                    let claimer = claimed_by.clone();
                    store
                        .update(
                            move |s| {
                                match s.tasks.iter_mut().find(|t| t.id == task_id) {
                                    Some(task) => task.claim(claimer),
                                    None => warn!(%task_id, "bounty request for unknown task"),
                                }
                            },
                            Some(attribution),
                        )
                        .await;
                    let _ = log_tx.send(SyncLogEvent::BountyApplied { task_id, claimed_by });
                }

                Some(BusMessage::SyncUpdate { payload, .. }) => {
                    // Another context (possibly a second Hub) broadcast
                    // state; the version rule decides, nothing more.
                    store.apply_remote(payload).await;
                }

                Some(BusMessage::HubHeartbeat { .. }) => {
                    // A competing Hub exists. Undetected and unresolved,
                    // matching the protocol as designed.
                }

                None => break,
            }
        }
    }

    store.set_hub_session(None).await;
    info!(session = %session, "hub stopped");
    let _ = log_tx.send(SyncLogEvent::HubDeactivated);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Task;
    use crate::store::AppStore;
    use crate::sync::bus::LocalBus;
    use crate::sync::session::InstanceId;
    use crate::version::Version;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn test_store(temp_dir: &TempDir, bus: Arc<LocalBus>) -> Arc<StoreService> {
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        StoreService::new(config, bus)
    }

    fn fast_config() -> HubTaskConfig {
        HubTaskConfig {
            heartbeat_period: Duration::from_millis(20),
            broadcast_period: Duration::from_millis(40),
        }
    }

    async fn recv_or_fail(rx: &mut crate::sync::bus::BusReceiver) -> BusMessage {
        timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("timed out waiting for bus message")
            .expect("bus closed")
    }

    #[tokio::test]
    async fn test_emits_immediately_on_activation() {
        let temp_dir = TempDir::new().unwrap();
        let bus = LocalBus::new();
        let store = test_store(&temp_dir, bus.clone());

        let observer = InstanceId::generate();
        let mut rx = bus.subscribe(&observer);

        let (log_tx, _) = broadcast::channel(16);
        let handle = spawn_hub_task(fast_config(), store, bus.clone(), log_tx);

        // Both a heartbeat and a full broadcast arrive well inside the
        // first timer period.
        let mut saw_heartbeat = false;
        let mut saw_broadcast = false;
        while !(saw_heartbeat && saw_broadcast) {
            match recv_or_fail(&mut rx).await {
                BusMessage::HubHeartbeat { hub_id, .. } => {
                    assert_eq!(hub_id, handle.session().id());
                    saw_heartbeat = true;
                }
                BusMessage::SyncUpdate { is_periodic, .. } => {
                    assert!(is_periodic);
                    saw_broadcast = true;
                }
                _ => {}
            }
        }

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_request_state_gets_out_of_band_reply() {
        let temp_dir = TempDir::new().unwrap();
        let bus = LocalBus::new();
        let store = test_store(&temp_dir, bus.clone());
        store.update(|s| s.tasks.push(Task::new("seed task")), None).await;

        // Slow periodic config: a reply inside the test window can only
        // be the fast path.
        let slow = HubTaskConfig {
            heartbeat_period: Duration::from_secs(60),
            broadcast_period: Duration::from_secs(60),
        };
        let node = InstanceId::generate();
        let mut rx = bus.subscribe(&node);

        let (log_tx, _) = broadcast::channel(16);
        let handle = spawn_hub_task(slow, store, bus.clone(), log_tx);

        // Drain the immediate activation emissions
        let mut drained = 0;
        while drained < 2 {
            recv_or_fail(&mut rx).await;
            drained += 1;
        }

        bus.publish(&node, BusMessage::request_state(node.clone()));

        let msg = recv_or_fail(&mut rx).await;
        match msg {
            BusMessage::SyncUpdate {
                payload,
                is_periodic,
                ..
            } => {
                assert!(!is_periodic);
                assert_eq!(payload.version, Version(1));
                assert_eq!(payload.tasks.len(), 1);
            }
            other => panic!("Expected SyncUpdate, got {:?}", other),
        }

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_clears_hub_session() {
        let temp_dir = TempDir::new().unwrap();
        let bus = LocalBus::new();
        let store = test_store(&temp_dir, bus.clone());

        let (log_tx, _) = broadcast::channel(16);
        let handle = spawn_hub_task(fast_config(), store.clone(), bus, log_tx);

        // Give the task a moment to install the session
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.hub_session().await.is_some());

        handle.shutdown().await;
        assert!(store.hub_session().await.is_none());
    }

    #[tokio::test]
    async fn test_reactivation_generates_new_session() {
        let temp_dir = TempDir::new().unwrap();
        let bus = LocalBus::new();
        let store = test_store(&temp_dir, bus.clone());
        let (log_tx, _) = broadcast::channel(16);

        let first = spawn_hub_task(fast_config(), store.clone(), bus.clone(), log_tx.clone());
        let first_id = first.session().id();
        first.shutdown().await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = spawn_hub_task(fast_config(), store, bus, log_tx);
        assert_ne!(second.session().id(), first_id);
        second.shutdown().await;
    }

    #[tokio::test]
    async fn test_incoming_update_applies_by_version_rule() {
        let temp_dir = TempDir::new().unwrap();
        let bus = LocalBus::new();
        let store = test_store(&temp_dir, bus.clone());

        let (log_tx, _) = broadcast::channel(16);
        let handle = spawn_hub_task(fast_config(), store.clone(), bus.clone(), log_tx);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let sender = InstanceId::generate();
        let mut newer = AppStore::seed();
        newer.version = Version(9);
        newer.tasks.push(Task::new("from elsewhere"));
        bus.publish(
            &sender,
            BusMessage::sync_update(newer, crate::sync::session::NO_HUB.to_string(), false),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.version().await, Version(9));

        handle.shutdown().await;
    }
}
