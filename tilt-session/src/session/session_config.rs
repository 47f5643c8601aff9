use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Minimum spacing of gyroscope `move` frames, in milliseconds.
    pub gyro_send_interval: u64,
    /// Spacing of `manualMove` frames while a pad direction is held.
    pub manual_send_interval: u64,
    /// Treat a missing or refused sensor as a session fault instead of
    /// falling back to scripted tutorial moves.
    pub require_sensor: bool,
}

impl SessionConfig {
    pub fn gyro_period(&self) -> Duration {
        Duration::from_millis(self.gyro_send_interval)
    }

    pub fn manual_period(&self) -> Duration {
        Duration::from_millis(self.manual_send_interval)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gyro_send_interval: 50,
            manual_send_interval: 100,
            require_sensor: false,
        }
    }
}
