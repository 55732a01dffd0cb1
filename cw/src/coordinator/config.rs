//! Coordinator configuration

use std::time::Duration;

use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Seconds of simulated time per tick, and the ticker's wall-clock period
    #[serde(rename = "tick-interval-secs", default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Channel buffer size for coordinator requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// Event bus capacity before slow subscribers start lagging
    #[serde(rename = "event-capacity", default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Audit log entries kept in memory
    #[serde(rename = "event-log-capacity", default = "default_event_log_capacity")]
    pub event_log_capacity: usize,

    /// Recent detections kept for readers
    #[serde(rename = "recent-detections", default = "default_recent_detections")]
    pub recent_detections: usize,
}

fn default_tick_interval_secs() -> u64 {
    debug!("default_tick_interval_secs: called");
    1
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    256
}

fn default_event_capacity() -> usize {
    debug!("default_event_capacity: called");
    1024
}

fn default_event_log_capacity() -> usize {
    debug!("default_event_log_capacity: called");
    500
}

fn default_recent_detections() -> usize {
    debug!("default_recent_detections: called");
    10
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            tick_interval_secs: 1,
            channel_buffer: 256,
            event_capacity: 1024,
            event_log_capacity: 500,
            recent_detections: 10,
        }
    }
}

impl CoordinatorConfig {
    /// Get the tick interval as a Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_secs == 0 {
            return Err(eyre!("coordinator: tick-interval-secs must be at least 1"));
        }
        if self.channel_buffer == 0 || self.event_capacity == 0 {
            return Err(eyre!("coordinator: channel-buffer and event-capacity must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.tick_interval_secs, 1);
        assert_eq!(config.channel_buffer, 256);
        assert_eq!(config.event_capacity, 1024);
        assert_eq!(config.event_log_capacity, 500);
        assert_eq!(config.recent_detections, 10);
    }

    #[test]
    fn test_serde_defaults_match_default() {
        let parsed: CoordinatorConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(parsed, CoordinatorConfig::default());
    }

    #[test]
    fn test_tick_interval_duration() {
        let config = CoordinatorConfig {
            tick_interval_secs: 5,
            ..Default::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_secs(5));
    }
}
