//! Participant identity
//!
//! Every execution context gets a fresh `InstanceId` for its lifetime; it
//! is never persisted across restarts and only tags messages, it never
//! authorizes them. A `HubSession` combines the owning instance id with a
//! creation timestamp and is regenerated each time a context takes the
//! Manager role, which is how Nodes tell a hub restart apart from a
//! transient blip.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Sentinel hub id used by publishers that are not currently the Hub
pub const NO_HUB: &str = "none";

/// Per-context instance identifier, unique for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generate a fresh instance id
    pub fn generate() -> Self {
        Self(format!("pw-{}", &uuid::Uuid::new_v4().to_string()[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one Hub activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubSession {
    /// Instance that holds the Manager role
    pub instance: InstanceId,
    /// Activation time, unix millis
    pub started_at_ms: i64,
}

impl HubSession {
    /// Start a new hub session for the given instance
    pub fn new(instance: InstanceId) -> Self {
        Self {
            instance,
            started_at_ms: Utc::now().timestamp_millis(),
        }
    }

    /// Wire representation: `<instance>-<millis>`
    pub fn id(&self) -> String {
        format!("{}-{}", self.instance, self.started_at_ms)
    }
}

impl std::fmt::Display for HubSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_ids_are_unique() {
        let a = InstanceId::generate();
        let b = InstanceId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("pw-"));
    }

    #[test]
    fn test_hub_session_id_contains_instance() {
        let instance = InstanceId::generate();
        let session = HubSession::new(instance.clone());

        assert!(session.id().starts_with(instance.as_str()));
        assert!(session.started_at_ms > 0);
    }

    #[test]
    fn test_reactivation_yields_distinct_session() {
        // Same instance, two activations: ids must differ so Nodes can
        // detect the restart. Timestamps have millisecond resolution, so
        // force distinct values.
        let instance = InstanceId::generate();
        let a = HubSession::new(instance.clone());
        let mut b = HubSession::new(instance);
        b.started_at_ms = a.started_at_ms + 1;

        assert_ne!(a.id(), b.id());
    }
}
