//! In-process room, used by tests and local multi-node runs.

use super::{EventReceiver, RoomTransport, TransportError};
use crate::session::SessionEvent;
use log::debug;
use parking_lot::Mutex;
use shared::{ChannelMessage, PeerId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

type Members = BTreeMap<PeerId, mpsc::UnboundedSender<SessionEvent>>;

/// A single shared room living in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    members: Arc<Mutex<Members>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `peer_id` to the room. Existing members and the newcomer are told
    /// about each other through `PeerJoined` events.
    pub fn join(&self, peer_id: PeerId) -> (MemoryRoom, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut members = self.members.lock();
        for (id, member) in members.iter() {
            let _ = member.send(SessionEvent::PeerJoined(peer_id.clone()));
            let _ = sender.send(SessionEvent::PeerJoined(id.clone()));
        }
        members.insert(peer_id.clone(), sender);
        debug!("{} joined memory room ({} members)", peer_id, members.len());

        let room = MemoryRoom {
            hub: self.clone(),
            peer_id,
        };
        (room, receiver)
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().len()
    }
}

/// One member's handle on a [`MemoryHub`]. Dropping it leaves the room.
#[derive(Debug)]
pub struct MemoryRoom {
    hub: MemoryHub,
    peer_id: PeerId,
}

impl MemoryRoom {
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }
}

impl RoomTransport for MemoryRoom {
    fn broadcast(&self, message: &ChannelMessage) -> Result<(), TransportError> {
        let members = self.hub.members.lock();
        if !members.contains_key(&self.peer_id) {
            return Err(TransportError::Closed);
        }

        for (id, member) in members.iter().filter(|(id, _)| **id != self.peer_id) {
            let event = SessionEvent::Message {
                from: self.peer_id.clone(),
                message: message.clone(),
            };
            if member.send(event).is_err() {
                debug!("Dropping message for {}: receiver gone", id);
            }
        }
        Ok(())
    }

    fn leave(&self) {
        let mut members = self.hub.members.lock();
        if members.remove(&self.peer_id).is_none() {
            return;
        }
        for member in members.values() {
            let _ = member.send(SessionEvent::PeerLeft(self.peer_id.clone()));
        }
    }
}

impl Drop for MemoryRoom {
    fn drop(&mut self) {
        self.leave();
    }
}
