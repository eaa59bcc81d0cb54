//! World consumers. Rendering proper is somebody else's job; these read the
//! current world view once per tick.

use log::{debug, info};
use shared::{PeerId, WorldStateMap};

pub trait WorldSink {
    fn present(&mut self, local: &PeerId, world: &WorldStateMap);
}

/// Logs the local avatar every `every_ticks` presents.
#[derive(Debug)]
pub struct LogSink {
    every_ticks: u64,
    presented: u64,
}

impl LogSink {
    pub fn new(every_ticks: u64) -> Self {
        Self {
            every_ticks: every_ticks.max(1),
            presented: 0,
        }
    }
}

impl WorldSink for LogSink {
    fn present(&mut self, local: &PeerId, world: &WorldStateMap) {
        self.presented += 1;
        if self.presented % self.every_ticks != 0 {
            return;
        }

        match world.get(local) {
            Some(state) => info!(
                "You are at ({:.2}, {:.2}, {:.2}) {} with {} players in view",
                state.position.x,
                state.position.y,
                state.position.z,
                state.color,
                world.len()
            ),
            None => info!("Waiting for the host to place you ({} players in view)", world.len()),
        }
        for (id, state) in world.iter().filter(|(id, _)| *id != local) {
            debug!(
                "  {} at ({:.2}, {:.2}) {}",
                id, state.position.x, state.position.z, state.color
            );
        }
    }
}

/// Keeps every presented frame; handy in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub frames: Vec<WorldStateMap>,
}

impl WorldSink for RecordingSink {
    fn present(&mut self, _local: &PeerId, world: &WorldStateMap) {
        self.frames.push(world.clone());
    }
}
