use crate::sensor::direction::Direction;
use serde::{Deserialize, Serialize};
use tilt_core::{MotionError, Vector2};

/// Events emitted by the sensor pipeline. Only real changes are reported.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    CoordinateChange(Vector2),
    DirectionChange(Direction),
    CalibrationComplete,
    Error(MotionError),
}

/// Point-in-time copy of the pipeline state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorStatus {
    pub coordinates: Vector2,
    pub direction: Direction,
    pub is_calibrated: bool,
    pub is_initialized: bool,
}
