use serde::Serialize;
use std::fmt;
use tilt_core::{FinalPlayerData, MotionError, PeerId};

/// Session phase. Only the host moves it forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameScene {
    #[default]
    Lobby,
    Tutorial,
    Playing,
    Awards,
}

impl fmt::Display for GameScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameScene::Lobby => "lobby",
            GameScene::Tutorial => "tutorial",
            GameScene::Playing => "playing",
            GameScene::Awards => "awards",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPlayer {
    pub id: PeerId,
    pub name: Option<String>,
    pub avatar: Option<String>,
    /// Assigned by the host with `initial`.
    pub group: Option<String>,
    pub color: Option<String>,
}

/// A remote controller as it introduced itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerInfo {
    pub id: PeerId,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TutorialPrompt {
    pub step: String,
    pub message: String,
}

/// Immutable snapshot published to consumers after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub host_id: Option<PeerId>,
    pub game_scene: GameScene,
    pub local_player: LocalPlayer,
    pub other_players: Vec<PlayerInfo>,
    pub final_results: Vec<FinalPlayerData>,
    pub tutorial: Option<TutorialPrompt>,
    pub is_host: bool,
    /// The signaling link is open.
    pub connected: bool,
    /// Unrecoverable setup failure. Cleared by the next successful connect.
    pub fault: Option<MotionError>,
}

impl SessionState {
    pub fn new(local_id: PeerId) -> Self {
        Self {
            host_id: None,
            game_scene: GameScene::Lobby,
            local_player: LocalPlayer {
                id: local_id,
                name: None,
                avatar: None,
                group: None,
                color: None,
            },
            other_players: Vec::new(),
            final_results: Vec::new(),
            tutorial: None,
            is_host: false,
            connected: false,
            fault: None,
        }
    }

    pub fn player(&self, id: &PeerId) -> Option<&PlayerInfo> {
        self.other_players.iter().find(|p| &p.id == id)
    }
}
