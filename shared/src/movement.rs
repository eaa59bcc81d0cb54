//! Per-tick movement integration shared by whichever node currently hosts.

use crate::{InputState, Position, AVATAR_RADIUS, MOVE_SPEED, WORLD_HALF_EXTENT};

/// Per-session movement parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementSettings {
    /// Displacement per tick for each held direction.
    pub speed: f32,
    pub world_half_extent: f32,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            speed: MOVE_SPEED,
            world_half_extent: WORLD_HALF_EXTENT,
        }
    }
}

impl MovementSettings {
    pub fn step(&self, position: Position, input: &InputState) -> Position {
        step(position, input, self.speed, self.world_half_extent)
    }

    /// Inclusive range `x` and `z` are clamped into.
    pub fn bounds(&self) -> (f32, f32) {
        bounds(self.world_half_extent)
    }
}

fn bounds(world_half_extent: f32) -> (f32, f32) {
    (
        -world_half_extent + AVATAR_RADIUS,
        world_half_extent - AVATAR_RADIUS,
    )
}

/// Advances `position` by one tick of `input`.
///
/// Every held direction is applied on its own, so opposite directions cancel.
/// The result is clamped into the world box and projected back onto the
/// terrain; the incoming `y` is ignored.
pub fn step(position: Position, input: &InputState, speed: f32, world_half_extent: f32) -> Position {
    let mut x = position.x;
    let mut z = position.z;

    if input.forward {
        z -= speed;
    }
    if input.backward {
        z += speed;
    }
    if input.left {
        x -= speed;
    }
    if input.right {
        x += speed;
    }

    let (min, max) = bounds(world_half_extent);
    x = x.max(min).min(max);
    z = z.max(min).min(max);

    Position::on_terrain(x, z)
}
