//! Types, constants and pure simulation functions used identically by every peer.
//!
//! Everything in here must produce the same result on every node: movement is
//! recomputed by whichever peer currently holds the host role, and elevation is
//! never sent over the wire.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

pub mod movement;
pub mod protocol;
pub mod terrain;

pub use movement::{step, MovementSettings};
pub use protocol::{decode, encode, Channel, ChannelMessage, Packet};
pub use terrain::height;

pub const MOVE_SPEED: f32 = 0.15;
pub const WORLD_SIZE: f32 = 400.0;
pub const WORLD_HALF_EXTENT: f32 = WORLD_SIZE / 2.0;
/// Avatar radius; doubles as the clamp margin and the vertical offset above the terrain.
pub const AVATAR_RADIUS: f32 = 1.0;
pub const DEFAULT_TICK_RATE: u32 = 60;
pub const PROTOCOL_VERSION: u32 = 1;

/// Unique per-connection participant handle.
///
/// Ordering is plain lexicographic string ordering; host election relies on it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier for a new connection.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Currently held directional controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl InputState {
    pub fn is_idle(&self) -> bool {
        !(self.forward || self.backward || self.left || self.right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    /// Builds a position resting on the terrain at `(x, z)`.
    pub fn on_terrain(x: f32, z: f32) -> Self {
        Self {
            x,
            y: terrain::height(x, z) + AVATAR_RADIUS,
            z,
        }
    }

    /// World origin projected onto the terrain.
    pub fn spawn() -> Self {
        Self::on_terrain(0.0, 0.0)
    }
}

/// 24-bit RGB display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(u32);

impl Color {
    pub const DEFAULT: Color = Color(0xFF_FF_FF);

    pub fn from_rgb(rgb: u32) -> Self {
        Self(rgb & 0xFF_FF_FF)
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(0..=0xFF_FF_FF))
    }

    pub fn rgb(&self) -> u32 {
        self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

/// Replicated per-player state. Input is host-side bookkeeping and never lives here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub position: Position,
    pub color: Color,
}

impl PlayerState {
    pub fn new(position: Position, color: Color) -> Self {
        Self { position, color }
    }

    /// Lazily created entry for a peer the host has no state for yet.
    pub fn spawn_default() -> Self {
        Self::new(Position::spawn(), Color::DEFAULT)
    }
}

/// Full authoritative snapshot of every known player.
pub type WorldStateMap = BTreeMap<PeerId, PlayerState>;
