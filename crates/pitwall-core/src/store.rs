//! Application store and sync dispatcher
//!
//! The `AppStore` is the single serializable snapshot of all team state,
//! versioned by a monotonic counter. `StoreService` is the only mutation
//! entry point: it applies an updater, bumps the version, persists
//! best-effort, notifies local subscribers synchronously, and rebroadcasts
//! the full snapshot on the bus.
//!
//! Conflict policy is wholesale replacement: an incoming snapshot that is
//! not older than the local one fully overwrites it. There is no
//! field-level merge; concurrent edits in two contexts race and the one
//! processed last wins. That is a documented property of the protocol,
//! not an accident.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{Attribution, NewsPost, SimResult, Sponsor, Task, TeamMember, Transaction};
use crate::storage::SnapshotPersistence;
use crate::sync::bus::Bus;
use crate::sync::message::BusMessage;
use crate::sync::session::{HubSession, InstanceId, NO_HUB};
use crate::version::Version;

/// The complete application state at one version
///
/// Travels atomically through the sync layer; the domain collections are
/// opaque to the protocol, only `version` participates in ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppStore {
    /// Monotonically increasing version, the sole conflict signal
    pub version: Version,
    /// Who performed the last mutation (informational only)
    #[serde(default)]
    pub last_updated_by: Option<Attribution>,
    #[serde(default)]
    pub members: Vec<TeamMember>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub sponsors: Vec<Sponsor>,
    #[serde(default)]
    pub news: Vec<NewsPost>,
    #[serde(default)]
    pub sim_results: Vec<SimResult>,
}

impl AppStore {
    /// The hard-coded fallback snapshot used when durable storage is
    /// missing or unreadable
    pub fn seed() -> Self {
        Self::default()
    }
}

/// Handle identifying one registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type SubscriberFn = Arc<dyn Fn(&AppStore) + Send + Sync>;

/// The local store plus the sync dispatcher
///
/// One `StoreService` per execution context. Each context mutates only
/// its own in-memory snapshot; the only shared resources are the bus and
/// durable storage, both serialized by message passing.
pub struct StoreService {
    instance: InstanceId,
    persistence: SnapshotPersistence,
    bus: Arc<dyn Bus>,
    inner: Mutex<AppStore>,
    subscribers: Mutex<Vec<(SubscriptionId, SubscriberFn)>>,
    next_subscription: AtomicU64,
    /// Set while this context holds the Manager role
    hub_session: Mutex<Option<HubSession>>,
}

impl StoreService {
    /// Create the store for this context, loading durable state if present
    pub fn new(config: Config, bus: Arc<dyn Bus>) -> Arc<Self> {
        let persistence = SnapshotPersistence::new(config);
        let snapshot = persistence.load_or_seed();
        debug!(version = %snapshot.version, "store loaded");

        Arc::new(Self {
            instance: InstanceId::generate(),
            persistence,
            bus,
            inner: Mutex::new(snapshot),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            hub_session: Mutex::new(None),
        })
    }

    /// This context's instance id
    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    /// Current snapshot (cloned)
    pub async fn snapshot(&self) -> AppStore {
        self.inner.lock().await.clone()
    }

    /// Current snapshot version
    pub async fn version(&self) -> Version {
        self.inner.lock().await.version
    }

    /// Apply a local mutation
    ///
    /// Bumps the version by exactly one, persists best-effort, notifies
    /// subscribers, and publishes the full new snapshot on the bus. Never
    /// fails from the caller's perspective: persistence errors are logged
    /// and the in-memory mutation still takes effect.
    pub async fn update(
        &self,
        updater: impl FnOnce(&mut AppStore),
        attribution: Option<Attribution>,
    ) -> Version {
        let next = {
            let mut guard = self.inner.lock().await;
            let mut next = guard.clone();
            updater(&mut next);
            next.version = guard.version.next();
            if let Some(attr) = attribution {
                next.last_updated_by = Some(attr);
            }
            *guard = next.clone();
            next
        };

        self.persist(&next);
        self.notify(&next).await;

        let hub_id = self.hub_id().await;
        self.bus
            .publish(&self.instance, BusMessage::sync_update(next.clone(), hub_id, false));

        next.version
    }

    /// Apply a snapshot received from another context
    ///
    /// Replaces the local store wholesale iff the incoming version is not
    /// older. Persists and notifies subscribers on apply, but does NOT
    /// republish (the sender already broadcast it). Returns whether the
    /// snapshot was applied.
    pub async fn apply_remote(&self, incoming: AppStore) -> bool {
        {
            let mut guard = self.inner.lock().await;
            if !Version::accepts(incoming.version, guard.version) {
                debug!(
                    incoming = %incoming.version,
                    local = %guard.version,
                    "discarding stale snapshot"
                );
                return false;
            }
            *guard = incoming.clone();
        }

        self.persist(&incoming);
        self.notify(&incoming).await;
        true
    }

    /// Register a subscriber, invoked synchronously on every store change
    pub async fn subscribe(&self, callback: impl Fn(&AppStore) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .await
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscriber
    pub async fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().await.retain(|(sid, _)| *sid != id);
    }

    /// Mark this context as the active Hub (or clear the mark)
    ///
    /// Owned by the hub service; the dispatcher only reads it to tag
    /// outgoing broadcasts.
    pub async fn set_hub_session(&self, session: Option<HubSession>) {
        *self.hub_session.lock().await = session;
    }

    /// The active hub session, if this context is the Hub
    pub async fn hub_session(&self) -> Option<HubSession> {
        self.hub_session.lock().await.clone()
    }

    /// Wire hub id for outgoing messages
    pub async fn hub_id(&self) -> String {
        self.hub_session
            .lock()
            .await
            .as_ref()
            .map(|s| s.id())
            .unwrap_or_else(|| NO_HUB.to_string())
    }

    fn persist(&self, snapshot: &AppStore) {
        // Durability is best-effort; the live session must not fail on a
        // quota or serialization error.
        if let Err(e) = self.persistence.save(snapshot) {
            warn!("Failed to persist snapshot: {}", e);
        }
    }

    async fn notify(&self, snapshot: &AppStore) {
        let callbacks: Vec<SubscriberFn> = self
            .subscribers
            .lock()
            .await
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        for cb in callbacks {
            cb(snapshot);
        }
    }
}
