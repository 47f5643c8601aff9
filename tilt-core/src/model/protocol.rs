//! Application-level wire protocol carried over the peer data channels.
//!
//! Every frame is one line of UTF-8 JSON with a mandatory `type`
//! discriminator. There is no sequence number or length prefix; per-peer
//! ordering comes from the reliable ordered channel.

use crate::error::MotionError;
use crate::model::peer::PeerId;
use crate::model::vector::Vector2;
use serde::{Deserialize, Serialize};

/// One row of the authoritative final standings sent with `terminate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPlayerData {
    pub name: String,
    pub point: i64,
    pub rank: u32,
    pub color: String,
    pub skin: String,
}

/// Frames this controller originates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "identify", rename_all = "camelCase")]
    Identify {
        nickname: String,
        character_name: String,
    },
    #[serde(rename = "move")]
    Move { vector: Vector2 },
    #[serde(rename = "manualMove")]
    ManualMove { vector: Vector2 },
    #[serde(rename = "start_game", rename_all = "camelCase")]
    StartGame { level_name: String },
    #[serde(rename = "calibrated")]
    Calibrated,
    #[serde(rename = "tutorial_step_complete")]
    TutorialStepComplete { step: String },
}

impl OutboundMessage {
    /// Serialize to the single-line JSON text frame.
    pub fn encode(&self) -> String {
        // Plain data with string keys, serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Frames this controller understands.
///
/// Input frames from other controllers (`move`, `manualMove`, ...) reach us
/// through the mesh too; they decode fine and carry no effect here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "identify", rename_all = "camelCase")]
    Identify {
        nickname: String,
        character_name: String,
    },
    #[serde(rename = "initial")]
    Initial {
        #[serde(default)]
        group: Option<String>,
        #[serde(default)]
        color: Option<String>,
    },
    #[serde(rename = "host_update", rename_all = "camelCase")]
    HostUpdate { host_id: PeerId },
    #[serde(rename = "navigate_to_game")]
    NavigateToGame,
    #[serde(rename = "navigate_to_playing")]
    NavigateToPlaying,
    #[serde(rename = "terminate", rename_all = "camelCase")]
    Terminate {
        final_player_datas: Vec<FinalPlayerData>,
    },
    #[serde(rename = "tutorial_instruction")]
    TutorialInstruction {
        step: String,
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "move")]
    Move { vector: Vector2 },
    #[serde(rename = "manualMove")]
    ManualMove { vector: Vector2 },
    #[serde(rename = "start_game", rename_all = "camelCase")]
    StartGame { level_name: String },
    #[serde(rename = "calibrated")]
    Calibrated,
    #[serde(rename = "tutorial_step_complete")]
    TutorialStepComplete { step: String },
}

impl InboundMessage {
    pub fn decode(frame: &str) -> Result<Self, MotionError> {
        serde_json::from_str(frame).map_err(|e| MotionError::protocol(e.to_string()))
    }
}

/// Steps of the tilt tutorial driven by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TutorialStep {
    Forward,
    Left,
    Right,
    Backward,
    Complete,
}

impl TutorialStep {
    pub fn parse(step: &str) -> Option<Self> {
        match step {
            "forward" => Some(Self::Forward),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "backward" => Some(Self::Backward),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Left => "left",
            Self::Right => "right",
            Self::Backward => "backward",
            Self::Complete => "complete",
        }
    }

    /// Text shown when the host sends no message of its own.
    pub fn default_instruction(&self) -> &'static str {
        match self {
            Self::Forward => "Tilt your phone forward",
            Self::Left => "Tilt your phone to the left",
            Self::Right => "Tilt your phone to the right",
            Self::Backward => "Tilt your phone backward",
            Self::Complete => "Great! Training complete!",
        }
    }

    /// Canned tilt that satisfies this step, used by devices without a sensor.
    pub fn cheat_vector(&self) -> Option<Vector2> {
        match self {
            Self::Forward => Some(Vector2::new(0.0, 1.0)),
            Self::Backward => Some(Vector2::new(0.0, -1.0)),
            Self::Left => Some(Vector2::new(-1.0, 0.0)),
            Self::Right => Some(Vector2::new(1.0, 0.0)),
            Self::Complete => None,
        }
    }
}
