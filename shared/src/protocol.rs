//! Wire messages.
//!
//! `ChannelMessage` is what peers say to each other on the two logical
//! channels. `Packet` is the datagram envelope exchanged with the room relay,
//! which carries channel messages between peers alongside membership traffic.

use crate::{InputState, PeerId, WorldStateMap};
use serde::{Deserialize, Serialize};

/// Logical channel a message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Clients to host: raw held controls, once per tick.
    Input,
    /// Host to clients: full authoritative snapshot, once per tick.
    State,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChannelMessage {
    Input(InputState),
    WorldState {
        /// Host tick that produced the snapshot.
        tick: u64,
        players: WorldStateMap,
    },
}

impl ChannelMessage {
    pub fn channel(&self) -> Channel {
        match self {
            ChannelMessage::Input(_) => Channel::Input,
            ChannelMessage::WorldState { .. } => Channel::State,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    // Peer to relay
    Join {
        version: u32,
        room_id: String,
        peer_id: PeerId,
    },
    Publish {
        message: ChannelMessage,
    },
    Heartbeat,
    Leave,

    // Relay to peer
    Joined {
        peers: Vec<PeerId>,
    },
    Rejected {
        reason: String,
    },
    PeerJoined {
        peer_id: PeerId,
    },
    PeerLeft {
        peer_id: PeerId,
    },
    Deliver {
        from: PeerId,
        message: ChannelMessage,
    },
}

pub fn encode(packet: &Packet) -> bincode::Result<Vec<u8>> {
    bincode::serialize(packet)
}

pub fn decode(bytes: &[u8]) -> bincode::Result<Packet> {
    bincode::deserialize(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Color, PlayerState, Position, PROTOCOL_VERSION};

    fn sample_world() -> WorldStateMap {
        let mut players = WorldStateMap::new();
        players.insert(
            PeerId::from("a"),
            PlayerState::new(Position::on_terrain(1.0, 2.0), Color::from_rgb(0x123456)),
        );
        players.insert(PeerId::from("b"), PlayerState::spawn_default());
        players
    }

    #[test]
    fn test_channel_of_message() {
        assert_eq!(
            ChannelMessage::Input(InputState::default()).channel(),
            Channel::Input
        );
        let state = ChannelMessage::WorldState {
            tick: 1,
            players: WorldStateMap::new(),
        };
        assert_eq!(state.channel(), Channel::State);
    }

    #[test]
    fn test_packet_serialization_join() {
        let packet = Packet::Join {
            version: PROTOCOL_VERSION,
            room_id: "room-1".to_string(),
            peer_id: PeerId::from("abc"),
        };
        let decoded = decode(&encode(&packet).unwrap()).unwrap();

        match decoded {
            Packet::Join {
                version,
                room_id,
                peer_id,
            } => {
                assert_eq!(version, PROTOCOL_VERSION);
                assert_eq!(room_id, "room-1");
                assert_eq!(peer_id.as_str(), "abc");
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_world_state() {
        let packet = Packet::Deliver {
            from: PeerId::from("a"),
            message: ChannelMessage::WorldState {
                tick: 42,
                players: sample_world(),
            },
        };
        let decoded = decode(&encode(&packet).unwrap()).unwrap();

        match decoded {
            Packet::Deliver {
                from,
                message: ChannelMessage::WorldState { tick, players },
            } => {
                assert_eq!(from.as_str(), "a");
                assert_eq!(tick, 42);
                assert_eq!(players, sample_world());
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_world_state_fits_in_datagram() {
        let mut players = WorldStateMap::new();
        for _ in 0..16 {
            players.insert(PeerId::generate(), PlayerState::spawn_default());
        }
        let packet = Packet::Deliver {
            from: PeerId::generate(),
            message: ChannelMessage::WorldState { tick: 1, players },
        };
        assert!(encode(&packet).unwrap().len() < 2048);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode(&[0xff, 0xff, 0xff, 0xff, 0x01]).is_err());
    }
}
