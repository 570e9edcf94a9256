//! Broadcast bus message types
//!
//! The tagged union exchanged between contexts over the broadcast
//! transport. Delivery is fire-and-forget and unordered; the protocol
//! stays correct through periodic full-state retransmission plus the
//! monotonic version check, never through delivery guarantees.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::InstanceId;
use crate::store::AppStore;

/// Messages carried by the broadcast transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BusMessage {
    /// Liveness beacon from the Hub, no payload
    #[serde(rename = "hubHeartbeat")]
    HubHeartbeat {
        /// Unix millis at send time
        timestamp: i64,
        #[serde(rename = "hubId")]
        hub_id: String,
    },

    /// Full-state broadcast
    #[serde(rename = "syncUpdate")]
    SyncUpdate {
        payload: AppStore,
        #[serde(rename = "hubId")]
        hub_id: String,
        /// Set on the Hub's fixed-interval rebroadcasts
        #[serde(rename = "isPeriodic", default)]
        is_periodic: bool,
    },

    /// A (re)starting or (re)connecting Node asking the Hub for state
    #[serde(rename = "requestState")]
    RequestState {
        #[serde(rename = "senderId")]
        sender_id: InstanceId,
    },

    /// Write-forwarding: a Node asks the Hub to apply a bounty claim
    ///
    /// The Hub applies this through the standard dispatcher, so the
    /// result is indistinguishable from a local mutation on the Hub.
    #[serde(rename = "bountyRequest")]
    BountyRequest {
        #[serde(rename = "senderId")]
        sender_id: InstanceId,
        #[serde(rename = "taskId")]
        task_id: Uuid,
        #[serde(rename = "claimedBy")]
        claimed_by: String,
    },
}

impl BusMessage {
    /// Create a heartbeat stamped with the current time
    pub fn heartbeat(hub_id: String) -> Self {
        BusMessage::HubHeartbeat {
            timestamp: chrono::Utc::now().timestamp_millis(),
            hub_id,
        }
    }

    /// Create a full-state broadcast
    pub fn sync_update(payload: AppStore, hub_id: String, is_periodic: bool) -> Self {
        BusMessage::SyncUpdate {
            payload,
            hub_id,
            is_periodic,
        }
    }

    /// Create a state request
    pub fn request_state(sender_id: InstanceId) -> Self {
        BusMessage::RequestState { sender_id }
    }

    /// Create a bounty claim request
    pub fn bounty_request(sender_id: InstanceId, task_id: Uuid, claimed_by: String) -> Self {
        BusMessage::BountyRequest {
            sender_id,
            task_id,
            claimed_by,
        }
    }
}
