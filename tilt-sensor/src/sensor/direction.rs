use serde::{Deserialize, Serialize};
use std::fmt;
use tilt_core::Vector2;

/// Discrete label for the dominant tilt axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Still,
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    pub fn classify(vector: Vector2, threshold: f64) -> Self {
        let (ax, ay) = (vector.x.abs(), vector.y.abs());
        if ax < threshold && ay < threshold {
            Direction::Still
        } else if ay >= ax {
            if vector.y > 0.0 {
                Direction::Forward
            } else {
                Direction::Backward
            }
        } else if vector.x > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Still => "still",
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(s)
    }
}
