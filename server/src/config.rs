//! Runtime configuration for the authoritative server

use shared::{ENEMY_SPAWN_INTERVAL_SECS, SERVER_TICK_HZ, WORLD_HEIGHT, WORLD_WIDTH};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Enemy movement steps per second
    pub tick_rate: u32,
    /// Period of the enemy spawn timer
    pub spawn_interval: Duration,
    pub world_width: f32,
    pub world_height: f32,
    /// Upper bound on a single movement step, in seconds
    pub max_delta: f32,
}

impl ServerConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.tick_rate.max(1) as f32)
    }

    /// Spawn timer period, never shorter than a millisecond
    pub fn spawn_period(&self) -> Duration {
        self.spawn_interval.max(Duration::from_millis(1))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: SERVER_TICK_HZ,
            spawn_interval: Duration::from_secs_f32(ENEMY_SPAWN_INTERVAL_SECS),
            world_width: WORLD_WIDTH,
            world_height: WORLD_HEIGHT,
            max_delta: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.spawn_interval, Duration::from_secs(3));
        assert_eq!(config.tick_duration(), Duration::from_millis(50));
    }

    #[test]
    fn test_zero_tick_rate_does_not_divide_by_zero() {
        let config = ServerConfig {
            tick_rate: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.tick_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_spawn_interval_is_clamped() {
        let config = ServerConfig {
            spawn_interval: Duration::ZERO,
            ..ServerConfig::default()
        };
        assert_eq!(config.spawn_period(), Duration::from_millis(1));
        assert_eq!(ServerConfig::default().spawn_period(), Duration::from_secs(3));
    }
}
