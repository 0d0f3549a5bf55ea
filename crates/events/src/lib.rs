//! Job notification infrastructure.
//!
//! - [`NotificationHub`]: per-job subscriber registry that fans out full job
//!   snapshots to every open channel.
//! - [`Outbound`] / [`ServerEvent`]: what travels down a subscriber channel
//!   and how snapshots look on the wire.

pub mod hub;
pub mod message;

pub use hub::{NotificationHub, SubscriberChannel, SubscriberId};
pub use message::{is_heartbeat, Outbound, ServerEvent, HEARTBEAT_PING, HEARTBEAT_PONG};
