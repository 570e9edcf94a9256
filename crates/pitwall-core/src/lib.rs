//! Pitwall Core Library
//!
//! This crate provides the core functionality for Pitwall, a local-first
//! team management app for racing teams: shared roster, task board,
//! finances, and news, kept in sync across devices without a server.
//!
//! # Architecture
//!
//! - **Versioned snapshot**: one in-memory state tree, replaced wholesale
//!   on every remote update that carries an equal or newer version
//! - **Hub/Node broadcast**: the Manager context rebroadcasts the full
//!   snapshot periodically; every other context follows it
//! - **Cloud relay**: best-effort remote blob for devices that never
//!   share a broadcast context
//!
//! # Quick Start
//!
//! ```text
//! let bus = LocalBus::new();
//! let store = StoreService::new(config.clone(), bus.clone());
//! let sync = SyncService::new(config, store.clone(), bus);
//!
//! sync.set_role(Role::Manager).await;
//! store.update(|s| s.tasks.push(Task::new("Change tires")), None).await;
//! ```
//!
//! # Modules
//!
//! - `store`: versioned state tree and the dispatcher around it
//! - `models`: data structures for members, tasks, finances, and news
//! - `version`: the monotonic version and its acceptance rule
//! - `sync`: Hub/Node protocol (bus, messages, hub, watchdog, facade)
//! - `relay`: cloud blob push/pull with the failure gate
//! - `storage`: snapshot persistence
//! - `config`: application configuration

pub mod config;
pub mod models;
pub mod relay;
pub mod storage;
pub mod store;
pub mod sync;
pub mod version;

pub use config::Config;
pub use models::{Attribution, Role, Task, TaskStatus, TeamMember};
pub use relay::{BlobStore, CloudRelay, HttpBlobStore, RelayError};
pub use storage::{SnapshotPersistence, StorageError};
pub use store::{AppStore, StoreService};
pub use sync::{
    Bus, BusMessage, ConnectionStatus, InstanceId, LocalBus, SyncLogEvent, SyncService,
};
pub use version::Version;
