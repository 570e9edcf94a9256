//! Cloud relay
//!
//! Secondary, best-effort durability path: full-state JSON pushed to and
//! pulled from a remote key-value blob on a fixed interval, for devices
//! that never share a broadcast context. Network failures are expected
//! and frequent; after a few consecutive failures the relay degrades to
//! a silent no-op and resumes automatically once a call succeeds again.
//!
//! Conflict policy matches the broadcast path: wholesale replace by
//! version, no merging. Two devices racing a push against the same
//! remote id can silently drop one side's changes; the HTTP layer offers
//! no conditional writes, so last writer wins.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::storage::SnapshotPersistence;
use crate::store::{AppStore, StoreService};

/// Consecutive failures before routine relay calls go quiet
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Errors from the relay transport
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Create response carried no Location header")]
    MissingLocation,

    #[error("Unexpected HTTP status {0}")]
    Status(u16),
}

/// Remote key-value blob seam
///
/// The HTTP contract has no authentication and no conditional writes.
/// Tests substitute scripted implementations.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create a new blob, returning its id
    async fn create(&self, snapshot: &AppStore) -> Result<String, RelayError>;

    /// Overwrite an existing blob (idempotent)
    async fn update(&self, id: &str, snapshot: &AppStore) -> Result<(), RelayError>;

    /// Fetch a blob
    async fn fetch(&self, id: &str) -> Result<AppStore, RelayError>;
}

/// Blob store over plain HTTP
///
/// `POST <base>` creates and answers with a Location-style header whose
/// trailing segment is the new id; `PUT <base>/<id>` updates;
/// `GET <base>/<id>` fetches.
pub struct HttpBlobStore {
    client: reqwest::Client,
    base: String,
}

impl HttpBlobStore {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into(),
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn create(&self, snapshot: &AppStore) -> Result<String, RelayError> {
        let resp = self.client.post(&self.base).json(snapshot).send().await?;
        if !resp.status().is_success() {
            return Err(RelayError::Status(resp.status().as_u16()));
        }

        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(RelayError::MissingLocation)?;

        let id = location
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(location)
            .to_string();
        Ok(id)
    }

    async fn update(&self, id: &str, snapshot: &AppStore) -> Result<(), RelayError> {
        let resp = self
            .client
            .put(format!("{}/{}", self.base.trim_end_matches('/'), id))
            .json(snapshot)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RelayError::Status(resp.status().as_u16()));
        }
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<AppStore, RelayError> {
        let resp = self
            .client
            .get(format!("{}/{}", self.base.trim_end_matches('/'), id))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RelayError::Status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }
}

/// Relay with the consecutive-failure gate
///
/// Routine (polling) calls go through `try_push`/`try_pull`, which stop
/// touching the network once the gate trips. Explicit user actions use
/// `push`/`pull`, which always attempt and reset the counter on success;
/// those may surface their errors.
pub struct CloudRelay {
    blobs: Arc<dyn BlobStore>,
    failures: AtomicU32,
    threshold: u32,
}

impl CloudRelay {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self::with_threshold(blobs, DEFAULT_FAILURE_THRESHOLD)
    }

    pub fn with_threshold(blobs: Arc<dyn BlobStore>, threshold: u32) -> Self {
        Self {
            blobs,
            failures: AtomicU32::new(0),
            threshold,
        }
    }

    /// Current consecutive-failure count
    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    fn gate_open(&self) -> bool {
        self.consecutive_failures() < self.threshold
    }

    fn record(&self, succeeded: bool) {
        if succeeded {
            self.failures.store(0, Ordering::SeqCst);
        } else {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Push a snapshot, always attempting (manual action path)
    ///
    /// Creates a new blob when no id exists yet, otherwise overwrites.
    /// Returns the remote id.
    pub async fn push(
        &self,
        snapshot: &AppStore,
        existing_id: Option<&str>,
    ) -> Result<String, RelayError> {
        let result = match existing_id {
            Some(id) => self.blobs.update(id, snapshot).await.map(|_| id.to_string()),
            None => self.blobs.create(snapshot).await,
        };
        self.record(result.is_ok());
        result
    }

    /// Pull a snapshot, always attempting (manual action path)
    pub async fn pull(&self, id: &str) -> Result<AppStore, RelayError> {
        let result = self.blobs.fetch(id).await;
        self.record(result.is_ok());
        result
    }

    /// Push unless the failure gate has tripped
    ///
    /// Returns `Ok(None)` when suppressed; no network call is made.
    pub async fn try_push(
        &self,
        snapshot: &AppStore,
        existing_id: Option<&str>,
    ) -> Result<Option<String>, RelayError> {
        if !self.gate_open() {
            return Ok(None);
        }
        self.push(snapshot, existing_id).await.map(Some)
    }

    /// Pull unless the failure gate has tripped
    pub async fn try_pull(&self, id: &str) -> Result<Option<AppStore>, RelayError> {
        if !self.gate_open() {
            return Ok(None);
        }
        self.pull(id).await.map(Some)
    }
}

/// Handle to the running polling task
pub struct RelayHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

/// Spawn the relay polling loop
///
/// Each tick pulls the remote blob and applies it if strictly newer than
/// the local store, otherwise pushes the local snapshot when that one is
/// newer. The first successful push creates the blob and persists its id.
/// Failures never reach the user; the gate quiets a dead network.
pub fn spawn_relay_task(
    config: Config,
    interval: Duration,
    relay: Arc<CloudRelay>,
    store: Arc<StoreService>,
) -> RelayHandle {
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let task = tokio::spawn(relay_task_loop(config, interval, relay, store, shutdown_rx));
    RelayHandle { shutdown_tx, task }
}

async fn relay_task_loop(
    config: Config,
    interval: Duration,
    relay: Arc<CloudRelay>,
    store: Arc<StoreService>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let persistence = SnapshotPersistence::new(config);
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                poll_once(&persistence, &relay, &store).await;
            }
        }
    }
}

async fn poll_once(
    persistence: &SnapshotPersistence,
    relay: &CloudRelay,
    store: &StoreService,
) {
    let remote_id = persistence.load_remote_id().ok().flatten();

    match remote_id {
        Some(id) => match relay.try_pull(&id).await {
            Ok(Some(remote)) => {
                let local = store.version().await;
                if remote.version > local {
                    info!(remote = %remote.version, %local, "applying newer remote snapshot");
                    store.apply_remote(remote).await;
                } else if local > remote.version {
                    let snapshot = store.snapshot().await;
                    if let Err(e) = relay.try_push(&snapshot, Some(&id)).await {
                        debug!("relay push failed: {}", e);
                    }
                }
            }
            Ok(None) => {} // gate closed, skip quietly
            Err(e) => debug!("relay pull failed: {}", e),
        },
        None => {
            let snapshot = store.snapshot().await;
            match relay.try_push(&snapshot, None).await {
                Ok(Some(new_id)) => {
                    info!(id = %new_id, "created remote blob");
                    if let Err(e) = persistence.save_remote_id(&new_id) {
                        warn!("Failed to persist remote id: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("relay create failed: {}", e),
            }
        }
    }
}
