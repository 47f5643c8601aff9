//! Manual D-pad state and the rule deciding which input source may send.
//!
//! Only one input source is live at a time. While any pad direction is held
//! the gyroscope sender is silent; releasing the last direction emits exactly
//! one zero `manualMove` before gyroscope frames may flow again.

use serde::{Deserialize, Serialize};
use tilt_core::{OutboundMessage, Vector2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadDirection {
    Up,
    Down,
    Left,
    Right,
}

impl PadDirection {
    pub const ALL: [PadDirection; 4] = [
        PadDirection::Up,
        PadDirection::Down,
        PadDirection::Left,
        PadDirection::Right,
    ];

    pub fn vector(self) -> Vector2 {
        match self {
            PadDirection::Up => Vector2::new(0.0, 1.0),
            PadDirection::Down => Vector2::new(0.0, -1.0),
            PadDirection::Left => Vector2::new(-1.0, 0.0),
            PadDirection::Right => Vector2::new(1.0, 0.0),
        }
    }

    fn index(self) -> usize {
        match self {
            PadDirection::Up => 0,
            PadDirection::Down => 1,
            PadDirection::Left => 2,
            PadDirection::Right => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualPad {
    held: [bool; 4],
}

impl ManualPad {
    /// Returns true if the direction was not already held.
    pub fn press(&mut self, direction: PadDirection) -> bool {
        !std::mem::replace(&mut self.held[direction.index()], true)
    }

    pub fn release(&mut self, direction: PadDirection) -> bool {
        std::mem::replace(&mut self.held[direction.index()], false)
    }

    pub fn is_active(&self) -> bool {
        self.held.iter().any(|h| *h)
    }

    /// Sum of every held direction.
    pub fn vector(&self) -> Vector2 {
        PadDirection::ALL
            .iter()
            .filter(|d| self.held[d.index()])
            .fold(Vector2::ZERO, |acc, d| {
                let v = d.vector();
                Vector2::new(acc.x + v.x, acc.y + v.y)
            })
    }
}

/// Arbitrates between the gyroscope and the manual pad.
#[derive(Debug, Default)]
pub struct InputGate {
    pad: ManualPad,
}

impl InputGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold a direction. Returns true when the pad just became active, i.e.
    /// the manual sender should start.
    pub fn press(&mut self, direction: PadDirection) -> bool {
        let was_active = self.pad.is_active();
        self.pad.press(direction);
        !was_active && self.pad.is_active()
    }

    /// Let go of a direction. Returns the stop frame when this released the
    /// last held direction.
    pub fn release(&mut self, direction: PadDirection) -> Option<OutboundMessage> {
        if !self.pad.release(direction) || self.pad.is_active() {
            return None;
        }
        Some(OutboundMessage::ManualMove {
            vector: Vector2::ZERO,
        })
    }

    /// The periodic manual frame, if one should be sent now.
    pub fn manual_frame(&self) -> Option<OutboundMessage> {
        if !self.pad.is_active() {
            return None;
        }
        let vector = self.pad.vector();
        if vector.is_zero() {
            return None;
        }
        Some(OutboundMessage::ManualMove { vector })
    }

    pub fn gyro_allowed(&self) -> bool {
        !self.pad.is_active()
    }

    pub fn pad(&self) -> &ManualPad {
        &self.pad
    }
}
