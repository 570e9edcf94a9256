//! Storage layer
//!
//! Durable client storage for the application snapshot: one JSON file,
//! written atomically on every successful mutation and read once at
//! process start. Corrupt or missing data falls back to the seed
//! snapshot, never to a startup failure.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::SnapshotPersistence;
