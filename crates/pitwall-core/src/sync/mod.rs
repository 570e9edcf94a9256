//! Hub/Node snapshot synchronization
//!
//! A leader-election-free broadcast protocol keeping every context on the
//! same snapshot without a server:
//!
//! - the Manager context runs the [`hub`] service: periodic heartbeats,
//!   periodic full-state rebroadcasts, and fast-path replies to state
//!   requests,
//! - every other context runs the [`node`] watchdog: it follows the Hub's
//!   broadcasts, flips to "searching" when the Hub goes silent, and asks
//!   for a resync when it reconnects,
//! - [`service`] ties the two together behind one facade with injected
//!   timing configuration.
//!
//! Correctness rests on idempotent retransmission plus the monotonic
//! version check, not on delivery order or acknowledgements.

pub mod bus;
pub mod hub;
pub mod message;
pub mod node;
pub mod service;
pub mod session;

pub use bus::{Bus, BusReceiver, LocalBus};
pub use message::BusMessage;
pub use service::{ConnectionStatus, SyncLogEvent, SyncService};
pub use session::{HubSession, InstanceId, NO_HUB};
