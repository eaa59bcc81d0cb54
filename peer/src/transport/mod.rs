//! Room transports.
//!
//! A transport joins a room, hands back a queue of [`SessionEvent`]s for the
//! tick loop to drain, and broadcasts channel messages to every other member.
//! Delivery is best-effort: messages may be dropped or reordered.

use crate::session::SessionEvent;
use shared::ChannelMessage;
use tokio::sync::mpsc;

pub mod memory;
pub mod relay;

pub use memory::{MemoryHub, MemoryRoom};
pub use relay::RelayTransport;

pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("relay did not answer the join request in time")]
    JoinTimeout,

    #[error("relay rejected the join request: {0}")]
    Rejected(String),

    #[error("transport is closed")]
    Closed,
}

/// Fire-and-forget fan-out to the other members of the joined room.
pub trait RoomTransport {
    fn broadcast(&self, message: &ChannelMessage) -> Result<(), TransportError>;

    /// Announces departure. Further broadcasts are dropped.
    fn leave(&self);
}
