//! Broadcast transport
//!
//! A fire-and-forget, at-most-once pub/sub bus connecting all live
//! contexts, sender excluded. The platform primitive sits behind the
//! narrow [`Bus`] trait so tests can substitute lossy or scripted
//! transports without touching the protocol code.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use super::message::BusMessage;
use super::session::InstanceId;

/// Fixed channel name identifying the bus (one shared state domain)
pub const CHANNEL_NAME: &str = "pitwall-sync";

/// Broadcast bus seam
///
/// `publish` never fails and never blocks; a message published with no
/// listeners is simply lost, which the protocol tolerates by design.
pub trait Bus: Send + Sync {
    /// Publish a message to every other live context
    fn publish(&self, sender: &InstanceId, msg: BusMessage);

    /// Subscribe as the given instance; own messages are filtered out
    fn subscribe(&self, reader: &InstanceId) -> BusReceiver;
}

/// One message in flight, tagged with its publisher
#[derive(Debug, Clone)]
struct Envelope {
    sender: InstanceId,
    msg: BusMessage,
}

/// In-process broadcast bus
///
/// Backed by a `tokio::sync::broadcast` channel. Each `SyncService` in
/// the process counts as one context; sharing one `LocalBus` between
/// several services is the in-process equivalent of several tabs on one
/// origin.
pub struct LocalBus {
    tx: broadcast::Sender<Envelope>,
}

impl LocalBus {
    /// Create a bus with the default buffer depth
    pub fn new() -> Arc<Self> {
        Self::with_capacity(64)
    }

    /// Create a bus with an explicit buffer depth
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        let (tx, _) = broadcast::channel(capacity);
        Arc::new(Self { tx })
    }
}

impl Bus for LocalBus {
    fn publish(&self, sender: &InstanceId, msg: BusMessage) {
        trace!(sender = %sender, channel = CHANNEL_NAME, "bus publish");
        // No receivers means nobody is listening; that's not an error.
        let _ = self.tx.send(Envelope {
            sender: sender.clone(),
            msg,
        });
    }

    fn subscribe(&self, reader: &InstanceId) -> BusReceiver {
        BusReceiver {
            rx: self.tx.subscribe(),
            reader: reader.clone(),
        }
    }
}

/// Receiving end of a bus subscription
pub struct BusReceiver {
    rx: broadcast::Receiver<Envelope>,
    reader: InstanceId,
}

impl BusReceiver {
    /// Wait for the next message from another context
    ///
    /// Returns `None` once the bus itself is gone. Messages this context
    /// published are skipped, and a lagged receiver silently drops the
    /// overwritten backlog (at-most-once delivery).
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.rx.recv().await {
                Ok(env) if env.sender == self.reader => continue,
                Ok(env) => return Some(env.msg),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
