//! Sync service facade
//!
//! One `SyncService` per execution context, constructed with injected
//! timing configuration. It owns whichever protocol task the current
//! role requires (hub for the Manager, watchdog for everyone else) and
//! exposes the status and log streams the UI layer subscribes to.

use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};
use tracing::info;
use uuid::Uuid;

use super::bus::Bus;
use super::hub::{spawn_hub_task, HubHandle, HubTaskConfig};
use super::message::BusMessage;
use super::node::{spawn_watchdog_task, NodeHandle, WatchdogTaskConfig};
use super::session::InstanceId;
use crate::config::Config;
use crate::models::{Attribution, Role};
use crate::store::StoreService;
use crate::version::Version;

/// Connection status of this context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No live Hub seen within the timeout (or not started yet)
    Searching,
    /// Following a live Hub
    Connected,
    /// This context is the Hub
    Hosting,
}

/// Connection-lifecycle events for log panes
#[derive(Debug, Clone)]
pub enum SyncLogEvent {
    HubActivated { session: String },
    HubDeactivated,
    StateServed { to: InstanceId },
    StateRequested,
    Connected { hub_id: String },
    ConnectionLost,
    SnapshotApplied { version: Version },
    StaleSnapshotDiscarded { version: Version },
    BountyApplied { task_id: Uuid, claimed_by: String },
}

impl std::fmt::Display for SyncLogEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncLogEvent::HubActivated { session } => write!(f, "hub active ({})", session),
            SyncLogEvent::HubDeactivated => write!(f, "hub stopped"),
            SyncLogEvent::StateServed { to } => write!(f, "state served to {}", to),
            SyncLogEvent::StateRequested => write!(f, "state requested"),
            SyncLogEvent::Connected { hub_id } => write!(f, "connected to hub {}", hub_id),
            SyncLogEvent::ConnectionLost => write!(f, "connection lost"),
            SyncLogEvent::SnapshotApplied { version } => {
                write!(f, "snapshot v{} applied", version)
            }
            SyncLogEvent::StaleSnapshotDiscarded { version } => {
                write!(f, "stale snapshot v{} discarded", version)
            }
            SyncLogEvent::BountyApplied {
                task_id,
                claimed_by,
            } => write!(f, "bounty on {} claimed by {}", task_id, claimed_by),
        }
    }
}

enum ActiveRole {
    Idle,
    Hub(HubHandle),
    Node(NodeHandle),
}

/// Facade over the hub and watchdog tasks
pub struct SyncService {
    config: Config,
    store: Arc<StoreService>,
    bus: Arc<dyn Bus>,
    status_tx: watch::Sender<ConnectionStatus>,
    status_rx: watch::Receiver<ConnectionStatus>,
    log_tx: broadcast::Sender<SyncLogEvent>,
    active: Mutex<ActiveRole>,
}

impl SyncService {
    /// Create the sync service for this context
    pub fn new(config: Config, store: Arc<StoreService>, bus: Arc<dyn Bus>) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Searching);
        let (log_tx, _) = broadcast::channel(128);

        Self {
            config,
            store,
            bus,
            status_tx,
            status_rx,
            log_tx,
            active: Mutex::new(ActiveRole::Idle),
        }
    }

    /// This context's store
    pub fn store(&self) -> &Arc<StoreService> {
        &self.store
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to status changes
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Subscribe to connection-lifecycle log events
    pub fn subscribe_log(&self) -> broadcast::Receiver<SyncLogEvent> {
        self.log_tx.subscribe()
    }

    /// Adopt a role, replacing whatever task is currently running
    ///
    /// The Manager becomes the Hub by convention only; nothing stops a
    /// second context from also claiming the role.
    pub async fn set_role(&self, role: Role) {
        let mut active = self.active.lock().await;
        Self::stop(std::mem::replace(&mut *active, ActiveRole::Idle)).await;

        match role {
            Role::Manager => {
                info!(instance = %self.store.instance(), "taking the hub role");
                let _ = self.status_tx.send(ConnectionStatus::Hosting);
                let handle = spawn_hub_task(
                    HubTaskConfig {
                        heartbeat_period: self.config.heartbeat_period(),
                        broadcast_period: self.config.broadcast_period(),
                    },
                    self.store.clone(),
                    self.bus.clone(),
                    self.log_tx.clone(),
                );
                *active = ActiveRole::Hub(handle);
            }
            Role::Member => {
                info!(instance = %self.store.instance(), "following as a node");
                let handle = spawn_watchdog_task(
                    WatchdogTaskConfig {
                        timeout: self.config.watchdog_timeout(),
                        request_delay: self.config.request_delay(),
                    },
                    self.store.clone(),
                    self.bus.clone(),
                    self.status_tx.clone(),
                    self.log_tx.clone(),
                );
                *active = ActiveRole::Node(handle);
            }
        }
    }

    /// Claim a task bounty from this context
    ///
    /// On the Hub this is an ordinary local mutation. On a Node the claim
    /// is forwarded to the Hub, which applies it through the standard
    /// dispatcher; the result is identical either way.
    pub async fn claim_bounty(&self, task_id: Uuid, claimed_by: String) {
        if self.store.hub_session().await.is_some() {
            let attribution =
                Attribution::new(self.store.instance().as_str(), claimed_by.clone());
            self.store
                .update(
                    move |s| {
                        if let Some(task) = s.tasks.iter_mut().find(|t| t.id == task_id) {
                            task.claim(claimed_by);
                        }
                    },
                    Some(attribution),
                )
                .await;
        } else {
            self.bus.publish(
                self.store.instance(),
                BusMessage::bounty_request(
                    self.store.instance().clone(),
                    task_id,
                    claimed_by,
                ),
            );
        }
    }

    /// Stop whichever protocol task is running
    pub async fn shutdown(&self) {
        let mut active = self.active.lock().await;
        Self::stop(std::mem::replace(&mut *active, ActiveRole::Idle)).await;
        let _ = self.status_tx.send(ConnectionStatus::Searching);
    }

    async fn stop(active: ActiveRole) {
        match active {
            ActiveRole::Idle => {}
            ActiveRole::Hub(handle) => handle.shutdown().await,
            ActiveRole::Node(handle) => handle.shutdown().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Task, TaskStatus};
    use crate::sync::bus::{BusReceiver, LocalBus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    /// Drops the first N SyncUpdate publishes, then behaves normally.
    /// Simulates lost broadcasts to exercise convergence by repetition.
    struct LossyBus {
        inner: Arc<LocalBus>,
        drop_remaining: AtomicUsize,
    }

    impl LossyBus {
        fn new(inner: Arc<LocalBus>, drop_count: usize) -> Arc<Self> {
            Arc::new(Self {
                inner,
                drop_remaining: AtomicUsize::new(drop_count),
            })
        }
    }

    impl Bus for LossyBus {
        fn publish(&self, sender: &InstanceId, msg: BusMessage) {
            if matches!(msg, BusMessage::SyncUpdate { .. }) {
                let dropped = self
                    .drop_remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                        if n > 0 {
                            Some(n - 1)
                        } else {
                            None
                        }
                    })
                    .is_ok();
                if dropped {
                    return;
                }
            }
            self.inner.publish(sender, msg);
        }

        fn subscribe(&self, reader: &InstanceId) -> BusReceiver {
            self.inner.subscribe(reader)
        }
    }

    fn fast_timing(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().to_path_buf(),
            heartbeat_ms: 20,
            broadcast_ms: 40,
            watchdog_timeout_ms: 120,
            request_delay_ms: 10,
            ..Config::default()
        }
    }

    fn context(temp_dir: &TempDir, bus: Arc<dyn Bus>) -> SyncService {
        let config = fast_timing(temp_dir);
        let store = StoreService::new(config.clone(), bus.clone());
        SyncService::new(config, store, bus)
    }

    async fn wait_for_version(service: &SyncService, want: Version) {
        timeout(Duration::from_millis(1_000), async {
            while service.store().version().await != want {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for version {}", want));
    }

    async fn wait_for_status(service: &SyncService, want: ConnectionStatus) {
        let mut rx = service.subscribe_status();
        timeout(Duration::from_millis(1_000), async {
            loop {
                if *rx.borrow() == want {
                    return;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for status {:?}", want));
    }

    #[tokio::test]
    async fn test_manager_hosts_and_member_searches() {
        let bus = LocalBus::new();
        let dir_a = TempDir::new().unwrap();

        let service = context(&dir_a, bus);
        service.set_role(Role::Manager).await;
        assert_eq!(service.status(), ConnectionStatus::Hosting);

        // Switching to Member with no Hub around leaves us searching
        service.set_role(Role::Member).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(service.status(), ConnectionStatus::Searching);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_node_converges_to_hub_state() {
        let bus = LocalBus::new();
        let dir_hub = TempDir::new().unwrap();
        let dir_node = TempDir::new().unwrap();

        let hub = context(&dir_hub, bus.clone());
        let node = context(&dir_node, bus);

        hub.set_role(Role::Manager).await;
        hub.store()
            .update(|s| s.tasks.push(Task::new("Task A")), None)
            .await;

        node.set_role(Role::Member).await;

        wait_for_status(&node, ConnectionStatus::Connected).await;
        wait_for_version(&node, Version(1)).await;
        assert_eq!(node.store().snapshot().await, hub.store().snapshot().await);

        hub.shutdown().await;
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_then_reconnect_scenario() {
        // The full lifecycle: converge, lose the hub, see the status
        // flip, then reconverge on the next broadcast after the hub
        // returns with more data.
        let bus = LocalBus::new();
        let dir_hub = TempDir::new().unwrap();
        let dir_node = TempDir::new().unwrap();

        let hub = context(&dir_hub, bus.clone());
        let node = context(&dir_node, bus);

        hub.set_role(Role::Manager).await;
        hub.store()
            .update(|s| s.tasks.push(Task::new("Task A")), None)
            .await;

        node.set_role(Role::Member).await;
        wait_for_status(&node, ConnectionStatus::Connected).await;
        wait_for_version(&node, Version(1)).await;

        // Hub goes away; the watchdog times out
        hub.shutdown().await;
        wait_for_status(&node, ConnectionStatus::Searching).await;

        // Hub returns with a new task; the node reconnects and converges
        hub.set_role(Role::Manager).await;
        hub.store()
            .update(|s| s.tasks.push(Task::new("Task B")), None)
            .await;

        wait_for_status(&node, ConnectionStatus::Connected).await;
        wait_for_version(&node, Version(2)).await;

        let snapshot = node.store().snapshot().await;
        assert_eq!(snapshot.tasks.len(), 2);
        assert_eq!(snapshot.tasks[1].title, "Task B");

        hub.shutdown().await;
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_convergence_survives_dropped_broadcasts() {
        // The hub's first few full-state transmissions are lost; the
        // periodic rebroadcast corrects it within a broadcast period.
        let inner = LocalBus::new();
        let lossy: Arc<dyn Bus> = LossyBus::new(inner.clone(), 3);
        let dir_hub = TempDir::new().unwrap();
        let dir_node = TempDir::new().unwrap();

        let hub_config = fast_timing(&dir_hub);
        let hub_store = StoreService::new(hub_config.clone(), lossy.clone());
        let hub = SyncService::new(hub_config, hub_store, lossy);

        let node = context(&dir_node, inner);

        hub.set_role(Role::Manager).await;
        hub.store()
            .update(|s| s.tasks.push(Task::new("survives drops")), None)
            .await;

        node.set_role(Role::Member).await;

        wait_for_version(&node, Version(1)).await;
        assert_eq!(node.store().snapshot().await, hub.store().snapshot().await);

        hub.shutdown().await;
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_forwarded_bounty_matches_local_claim() {
        let bus = LocalBus::new();
        let dir_hub = TempDir::new().unwrap();
        let dir_node = TempDir::new().unwrap();

        let hub = context(&dir_hub, bus.clone());
        let node = context(&dir_node, bus);

        let task = Task::new("CFD mesh cleanup").with_bounty(50);
        let task_id = task.id;

        hub.set_role(Role::Manager).await;
        hub.store()
            .update(move |s| s.tasks.push(task), None)
            .await;

        node.set_role(Role::Member).await;
        wait_for_version(&node, Version(1)).await;

        let version_before = hub.store().version().await;

        // Node forwards the claim; the hub applies it via the dispatcher
        node.claim_bounty(task_id, "Jo".to_string()).await;

        wait_for_version(&hub, version_before.next()).await;

        let snapshot = hub.store().snapshot().await;
        let claimed = snapshot.tasks.iter().find(|t| t.id == task_id).unwrap();
        assert_eq!(claimed.status, TaskStatus::InProgress);
        assert_eq!(claimed.assigned_to.as_deref(), Some("Jo"));
        // Exactly one version bump, like a local claim on the hub
        assert_eq!(snapshot.version, version_before.next());
        assert_eq!(
            snapshot.last_updated_by.as_ref().map(|a| a.name.as_str()),
            Some("Jo")
        );

        // The rebroadcast brings the node to the same state
        wait_for_version(&node, version_before.next()).await;
        assert_eq!(node.store().snapshot().await, snapshot);

        hub.shutdown().await;
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_log_events_flow() {
        let bus = LocalBus::new();
        let dir_hub = TempDir::new().unwrap();

        let hub = context(&dir_hub, bus);
        let mut log = hub.subscribe_log();

        hub.set_role(Role::Manager).await;

        let event = timeout(Duration::from_millis(500), log.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, SyncLogEvent::HubActivated { .. }));

        hub.shutdown().await;
    }
}
