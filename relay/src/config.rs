//! Relay settings.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_MAX_PEERS_PER_ROOM: usize = 16;
/// Largest room whose full world snapshot still fits in one 2048-byte datagram.
pub const MAX_PEERS_PER_ROOM: usize = 32;
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub max_peers_per_room: usize,
    /// Silence after which a peer is evicted and announced as departed
    pub peer_timeout: Duration,
    /// How often silent peers are looked for
    pub timeout_check_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_peers_per_room: DEFAULT_MAX_PEERS_PER_ROOM,
            peer_timeout: DEFAULT_PEER_TIMEOUT,
            timeout_check_interval: Duration::from_secs(1),
        }
    }
}

impl RelayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configured room size, kept within `1..=MAX_PEERS_PER_ROOM`
    pub fn room_capacity(&self) -> usize {
        self.max_peers_per_room.clamp(1, MAX_PEERS_PER_ROOM)
    }
}

/// Command-line parser for the room size limit
pub fn parse_max_peers(value: &str) -> Result<usize, String> {
    let peers: usize = value
        .parse()
        .map_err(|e| format!("`{}` is not a peer count: {}", value, e))?;
    if (1..=MAX_PEERS_PER_ROOM).contains(&peers) {
        Ok(peers)
    } else {
        Err(format!(
            "room size must be between 1 and {} so snapshots fit in one datagram",
            MAX_PEERS_PER_ROOM
        ))
    }
}
