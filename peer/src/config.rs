use crate::transport::relay::DEFAULT_JOIN_TIMEOUT;
use shared::{MovementSettings, DEFAULT_TICK_RATE};
use std::time::Duration;

/// Runtime settings for one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    pub movement: MovementSettings,
    /// How often the world sink logs the local avatar, in ticks.
    pub status_every_ticks: u64,
    pub join_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            movement: MovementSettings::default(),
            status_every_ticks: 2 * DEFAULT_TICK_RATE as u64,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }
}

impl NodeConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}
