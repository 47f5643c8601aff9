use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables of the sensor pipeline. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SensorConfig {
    /// Normalised axis magnitude above which a direction label is reported.
    pub movement_threshold: f64,
    /// Length of the calibration window, in milliseconds.
    pub calibration_time: u64,
    /// Weight of the previous smoothed value, 0..1. Higher is smoother.
    pub smoothing_factor: f64,
    /// Normalised magnitude below which the vector is zeroed.
    pub dead_zone: f64,
    /// Tilt in degrees that maps to full deflection.
    pub max_threshold: f64,
    /// Start calibrating as soon as `init` succeeds.
    pub auto_calibrate: bool,
}

impl SensorConfig {
    pub fn calibration_window(&self) -> Duration {
        Duration::from_millis(self.calibration_time)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            movement_threshold: 0.3,
            calibration_time: 1000,
            smoothing_factor: 0.3,
            dead_zone: 0.1,
            max_threshold: 30.0,
            auto_calibrate: true,
        }
    }
}
