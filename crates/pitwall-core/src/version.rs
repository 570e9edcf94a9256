//! Snapshot version ordering
//!
//! The version counter is the sole conflict signal in the sync protocol:
//! an incoming snapshot replaces the local one wholesale when its version
//! is not older. The decision is a pure function here so it can be tested
//! independently of any transport.

use serde::{Deserialize, Serialize};

/// Monotonically increasing snapshot version
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    /// Next version after this one
    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }

    /// Whether a snapshot at `incoming` may replace one at `local`
    ///
    /// Equal versions are accepted: ties are broken by arrival order,
    /// matching the last-processed-wins rule of the protocol. Only
    /// strictly older snapshots are rejected.
    pub fn accepts(incoming: Version, local: Version) -> bool {
        incoming >= local
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
