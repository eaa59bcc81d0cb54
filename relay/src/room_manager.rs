//! Room membership for the relay
//!
//! This module tracks which network address belongs to which peer in which room:
//! - Membership lifecycle (join, leave, timeout)
//! - Per-room capacity limits and duplicate peer detection
//! - Activity tracking so silent peers are evicted and announced as departed
//!
//! The relay never interprets channel traffic; it only needs to know who else
//! is in the sender's room.

use log::info;
use shared::PeerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A peer connected to the relay
#[derive(Debug, Clone)]
pub struct Member {
    pub peer_id: PeerId,
    pub room_id: String,
    /// Network address for forwarding
    pub addr: SocketAddr,
    /// Last time we received any packet from this peer
    pub last_seen: Instant,
}

impl Member {
    pub fn new(peer_id: PeerId, room_id: String, addr: SocketAddr) -> Self {
        Self {
            peer_id,
            room_id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Returns true if nothing was heard from this peer within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Room full")]
    RoomFull,

    #[error("Peer id already in use")]
    DuplicatePeer,
}

/// Address-indexed membership across all rooms
///
/// A socket address belongs to at most one room at a time. Joining again from
/// the same address overwrites the previous membership.
pub struct RoomManager {
    members: HashMap<SocketAddr, Member>,
    /// Maximum number of peers sharing one room
    max_peers_per_room: usize,
}

impl RoomManager {
    pub fn new(max_peers_per_room: usize) -> Self {
        Self {
            members: HashMap::new(),
            max_peers_per_room,
        }
    }

    /// Adds `peer_id` at `addr` to `room_id`
    ///
    /// Returns the peers already present in the room. Fails when the room is at
    /// capacity or the peer id is taken by a different address in that room.
    pub fn join(
        &mut self,
        addr: SocketAddr,
        room_id: &str,
        peer_id: PeerId,
    ) -> Result<Vec<PeerId>, JoinError> {
        let existing = self.room_members(room_id, Some(addr));

        if existing.iter().any(|member| member.peer_id == peer_id) {
            return Err(JoinError::DuplicatePeer);
        }
        if existing.len() >= self.max_peers_per_room {
            return Err(JoinError::RoomFull);
        }

        info!("Peer {} joined room {} from {}", peer_id, room_id, addr);
        self.members
            .insert(addr, Member::new(peer_id, room_id.to_string(), addr));

        Ok(existing.into_iter().map(|member| member.peer_id).collect())
    }

    /// Removes the member at `addr`, returning it if present
    pub fn leave(&mut self, addr: &SocketAddr) -> Option<Member> {
        let member = self.members.remove(addr)?;
        info!("Peer {} left room {}", member.peer_id, member.room_id);
        Some(member)
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&Member> {
        self.members.get(addr)
    }

    /// Marks the member at `addr` as alive. Returns false for unknown addresses.
    pub fn touch(&mut self, addr: &SocketAddr) -> bool {
        match self.members.get_mut(addr) {
            Some(member) => {
                member.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Members of `room_id`, optionally leaving out one address
    pub fn room_members(&self, room_id: &str, exclude: Option<SocketAddr>) -> Vec<Member> {
        self.members
            .values()
            .filter(|member| member.room_id == room_id && Some(member.addr) != exclude)
            .cloned()
            .collect()
    }

    /// Removes and returns every member silent for longer than `timeout`
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Member> {
        let timed_out: Vec<SocketAddr> = self
            .members
            .values()
            .filter(|member| member.is_timed_out(timeout))
            .map(|member| member.addr)
            .collect();

        timed_out
            .iter()
            .filter_map(|addr| self.members.remove(addr))
            .inspect(|member| info!("Peer {} in room {} timed out", member.peer_id, member.room_id))
            .collect()
    }

    /// Number of distinct rooms with at least one member
    pub fn room_count(&self) -> usize {
        let mut rooms: Vec<&str> = self.members.values().map(|m| m.room_id.as_str()).collect();
        rooms.sort_unstable();
        rooms.dedup();
        rooms.len()
    }

    /// Returns the number of connected peers across all rooms
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
