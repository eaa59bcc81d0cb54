//! Local input producers.
//!
//! Physical controls live outside this crate; the node only needs something
//! that yields the currently held directions once per tick.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::InputState;

pub trait InputSource {
    /// Directions held during the current tick.
    fn sample(&mut self) -> InputState;
}

impl<T: InputSource + ?Sized> InputSource for Box<T> {
    fn sample(&mut self) -> InputState {
        (**self).sample()
    }
}

/// Never presses anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn sample(&mut self) -> InputState {
        InputState::default()
    }
}

/// Replays a fixed input forever.
#[derive(Debug, Clone, Copy)]
pub struct ConstantInput(pub InputState);

impl InputSource for ConstantInput {
    fn sample(&mut self) -> InputState {
        self.0
    }
}

/// Random walk that holds each chosen direction for a while, like a player
/// leaning on the arrow keys.
#[derive(Debug, Clone)]
pub struct WanderInput {
    rng: StdRng,
    current: InputState,
    remaining_ticks: u32,
    min_hold_ticks: u32,
    max_hold_ticks: u32,
}

impl WanderInput {
    pub fn new(seed: u64) -> Self {
        Self::with_hold(seed, 30, 180)
    }

    pub fn with_hold(seed: u64, min_hold_ticks: u32, max_hold_ticks: u32) -> Self {
        let min_hold_ticks = min_hold_ticks.max(1);
        Self {
            rng: StdRng::seed_from_u64(seed),
            current: InputState::default(),
            remaining_ticks: 0,
            min_hold_ticks,
            max_hold_ticks: max_hold_ticks.max(min_hold_ticks),
        }
    }

    fn choose_direction(&mut self) -> InputState {
        // One in four picks is a rest.
        if self.rng.gen_ratio(1, 4) {
            return InputState::default();
        }

        let vertical = self.rng.gen_range(0..3);
        let horizontal = self.rng.gen_range(0..3);
        InputState {
            forward: vertical == 1,
            backward: vertical == 2,
            left: horizontal == 1,
            right: horizontal == 2,
        }
    }
}

impl InputSource for WanderInput {
    fn sample(&mut self) -> InputState {
        if self.remaining_ticks == 0 {
            self.current = self.choose_direction();
            self.remaining_ticks = self
                .rng
                .gen_range(self.min_hold_ticks..=self.max_hold_ticks);
        }
        self.remaining_ticks -= 1;
        self.current
    }
}
