//! Peer-set bookkeeping and host election.
//!
//! The host is whichever member has the lexicographically smallest identifier
//! among the local node and every peer it currently knows about. Two nodes with
//! the same view of the room always agree; while a join is still propagating
//! their views may briefly differ, which the per-tick protocol tolerates.

use log::info;
use shared::PeerId;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Host => f.write_str("host"),
            Role::Client => f.write_str("client"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleTransition {
    pub from: Role,
    pub to: Role,
}

/// Smallest identifier among `local` and `peers`.
pub fn host_id<'a>(local: &'a PeerId, peers: impl IntoIterator<Item = &'a PeerId>) -> &'a PeerId {
    peers.into_iter().fold(local, |min, id| if id < min { id } else { min })
}

pub fn derive_role<'a>(local: &'a PeerId, peers: impl IntoIterator<Item = &'a PeerId>) -> Role {
    if host_id(local, peers) == local {
        Role::Host
    } else {
        Role::Client
    }
}

/// Connected peers as seen by one node, plus the role that view implies.
#[derive(Debug, Clone)]
pub struct MembershipTracker {
    local: PeerId,
    peers: BTreeSet<PeerId>,
    role: Role,
}

impl MembershipTracker {
    /// A fresh session has no peers, so the local node starts as host.
    pub fn new(local: PeerId) -> Self {
        Self {
            local,
            peers: BTreeSet::new(),
            role: Role::Host,
        }
    }

    /// Records a new peer. Returns the role change it caused, if any.
    pub fn peer_joined(&mut self, id: PeerId) -> Option<RoleTransition> {
        if id == self.local || !self.peers.insert(id.clone()) {
            return None;
        }
        info!("Peer {} joined ({} connected)", id, self.peers.len());
        self.recompute_role()
    }

    /// Forgets a peer. Returns the role change it caused, if any.
    pub fn peer_left(&mut self, id: &PeerId) -> Option<RoleTransition> {
        if !self.peers.remove(id) {
            return None;
        }
        info!("Peer {} left ({} connected)", id, self.peers.len());
        self.recompute_role()
    }

    fn recompute_role(&mut self) -> Option<RoleTransition> {
        let role = derive_role(&self.local, &self.peers);
        if role == self.role {
            return None;
        }

        let transition = RoleTransition {
            from: self.role,
            to: role,
        };
        self.role = role;
        info!("Role changed from {} to {}", transition.from, transition.to);
        Some(transition)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local
    }

    pub fn host_id(&self) -> &PeerId {
        host_id(&self.local, &self.peers)
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.iter()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// True for the local node and every connected peer.
    pub fn is_member(&self, id: &PeerId) -> bool {
        *id == self.local || self.peers.contains(id)
    }
}
