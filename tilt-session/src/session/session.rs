use std::collections::HashSet;

use tilt_core::{InboundMessage, MotionError, OutboundMessage, PeerId, TutorialStep};
use tilt_transport::{InboundFrame, SignalingState, TransportEvent};
use tracing::{debug, info, warn};

use crate::session::session_error::SessionError;
use crate::session::session_state::{GameScene, PlayerInfo, SessionState, TutorialPrompt};

/// A frame the session wants on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub message: OutboundMessage,
    /// `None` broadcasts to every open channel.
    pub target: Option<PeerId>,
}

impl Outgoing {
    pub fn broadcast(message: OutboundMessage) -> Self {
        Self {
            message,
            target: None,
        }
    }

    pub fn to(peer_id: PeerId, message: OutboundMessage) -> Self {
        Self {
            message,
            target: Some(peer_id),
        }
    }
}

/// The session state machine. Pure: it consumes transport events and user
/// actions, mutates [`SessionState`] and returns the frames to send. Timers,
/// sensors and sockets live in the [`Coordinator`](crate::Coordinator).
pub struct Session {
    state: SessionState,
    identity_confirmed: bool,
    sensor_supported: bool,
    initial_applied: bool,
    /// Receipt time of the last frame that was applied.
    last_processed: Option<u64>,
    /// Current transport roster.
    known: HashSet<PeerId>,
    /// Every peer id ever seen, local included. `host_update` may only name these.
    observed: HashSet<PeerId>,
    /// Peers with an open channel, in open order.
    open: Vec<PeerId>,
    /// Peers that got our `identify` on their current channel.
    identified: HashSet<PeerId>,
    /// The sensor finished at least one calibration.
    calibrated: bool,
    /// Peers told about the latest calibration on their current channel.
    announced: HashSet<PeerId>,
}

impl Session {
    pub fn new(local_id: PeerId, sensor_supported: bool) -> Self {
        let mut observed = HashSet::new();
        observed.insert(local_id.clone());
        Self {
            state: SessionState::new(local_id),
            identity_confirmed: false,
            sensor_supported,
            initial_applied: false,
            last_processed: None,
            known: HashSet::new(),
            observed,
            open: Vec::new(),
            identified: HashSet::new(),
            calibrated: false,
            announced: HashSet::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn local_id(&self) -> &PeerId {
        &self.state.local_player.id
    }

    pub fn has_open_channels(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn sensor_supported(&self) -> bool {
        self.sensor_supported
    }

    pub fn set_fault(&mut self, fault: MotionError) {
        self.state.fault = Some(fault);
    }

    /// Fix the local nickname and avatar, then introduce ourselves on every
    /// channel that is already open.
    pub fn confirm_identity(
        &mut self,
        nickname: impl Into<String>,
        avatar: impl Into<String>,
    ) -> Result<Vec<Outgoing>, SessionError> {
        if self.identity_confirmed {
            return Err(SessionError::IdentityAlreadyConfirmed);
        }
        self.identity_confirmed = true;
        self.state.local_player.name = Some(nickname.into());
        self.state.local_player.avatar = Some(avatar.into());

        let mut out = Vec::new();
        for peer_id in self.open.clone() {
            out.extend(self.introduce(peer_id));
        }
        Ok(out)
    }

    /// A calibration window completed. Every open channel hears `calibrated`
    /// now; channels opening later hear it when they open.
    pub fn on_calibrated(&mut self) -> Vec<Outgoing> {
        self.calibrated = true;
        self.announced.clear();
        let mut out = Vec::new();
        for peer_id in self.open.clone() {
            out.extend(self.announce_calibration(peer_id));
        }
        out
    }

    pub fn start_game(&self, level_name: impl Into<String>) -> Result<Outgoing, SessionError> {
        if !self.identity_confirmed {
            return Err(SessionError::IdentityNotConfirmed);
        }
        if !self.state.is_host {
            return Err(SessionError::NotHost);
        }
        Ok(Outgoing::broadcast(OutboundMessage::StartGame {
            level_name: level_name.into(),
        }))
    }

    pub fn on_transport(&mut self, event: &TransportEvent) -> Vec<Outgoing> {
        match event {
            TransportEvent::Signaling(state) => {
                self.on_signaling(*state);
                Vec::new()
            }

            TransportEvent::PeerConnected(peer_id) => {
                self.observed.insert(peer_id.clone());
                Vec::new()
            }

            TransportEvent::DataChannelOpen(peer_id) => {
                self.observed.insert(peer_id.clone());
                self.known.insert(peer_id.clone());
                if !self.open.contains(peer_id) {
                    self.open.push(peer_id.clone());
                }
                let mut out: Vec<Outgoing> = self.introduce(peer_id.clone()).into_iter().collect();
                out.extend(self.announce_calibration(peer_id.clone()));
                out
            }

            TransportEvent::DataChannelClosed(peer_id) => {
                self.open.retain(|p| p != peer_id);
                self.identified.remove(peer_id);
                self.announced.remove(peer_id);
                Vec::new()
            }

            TransportEvent::RosterChanged(peer_ids) => {
                self.on_roster(peer_ids);
                Vec::new()
            }

            TransportEvent::Message(frame) => self.on_frame(frame),

            TransportEvent::PeerFailed { peer_id, error } => {
                debug!("Peer {} failed: {}", peer_id, error);
                Vec::new()
            }
        }
    }

    fn on_signaling(&mut self, state: SignalingState) {
        match state {
            SignalingState::Open => {
                self.state.connected = true;
                self.state.fault = None;
            }
            SignalingState::Connecting | SignalingState::Closed => {
                self.state.connected = false;
            }
            SignalingState::Failed => {
                self.state.connected = false;
                self.state.fault = Some(MotionError::signaling_unavailable(
                    "signaling relay unavailable",
                ));
            }
        }
    }

    fn on_roster(&mut self, peer_ids: &[PeerId]) {
        self.known = peer_ids.iter().cloned().collect();
        self.observed.extend(peer_ids.iter().cloned());
        self.state
            .other_players
            .retain(|p| peer_ids.contains(&p.id));
    }

    /// `identify` for a freshly opened channel, at most once per channel.
    fn introduce(&mut self, peer_id: PeerId) -> Option<Outgoing> {
        if !self.identity_confirmed || self.identified.contains(&peer_id) {
            return None;
        }
        let nickname = self.state.local_player.name.clone()?;
        let character_name = self.state.local_player.avatar.clone()?;
        self.identified.insert(peer_id.clone());
        Some(Outgoing::to(
            peer_id,
            OutboundMessage::Identify {
                nickname,
                character_name,
            },
        ))
    }

    fn announce_calibration(&mut self, peer_id: PeerId) -> Option<Outgoing> {
        if !self.calibrated || !self.announced.insert(peer_id.clone()) {
            return None;
        }
        Some(Outgoing::to(peer_id, OutboundMessage::Calibrated))
    }

    fn on_frame(&mut self, frame: &InboundFrame) -> Vec<Outgoing> {
        if let Some(last) = self.last_processed
            && frame.received_at <= last
        {
            debug!(
                "Dropping stale frame from {} ({} <= {})",
                frame.peer_id, frame.received_at, last
            );
            return Vec::new();
        }

        let msg = match InboundMessage::decode(&frame.payload) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Dropping frame from {}: {}", frame.peer_id, e);
                return Vec::new();
            }
        };
        self.last_processed = Some(frame.received_at);
        self.observed.insert(frame.peer_id.clone());

        self.apply(&frame.peer_id, msg)
    }

    fn apply(&mut self, sender: &PeerId, msg: InboundMessage) -> Vec<Outgoing> {
        match msg {
            InboundMessage::Identify {
                nickname,
                character_name,
            } => {
                if sender == self.local_id() {
                    return Vec::new();
                }
                if !self.known.contains(sender) {
                    warn!("identify from {} which is not on the roster", sender);
                    return Vec::new();
                }
                let info = PlayerInfo {
                    id: sender.clone(),
                    name: nickname,
                    avatar: character_name,
                };
                match self
                    .state
                    .other_players
                    .iter_mut()
                    .find(|p| p.id == *sender)
                {
                    Some(existing) => *existing = info,
                    None => self.state.other_players.push(info),
                }
            }

            InboundMessage::Initial { group, color } => {
                if self.initial_applied {
                    info!("Ignoring repeated initial from {}", sender);
                    return Vec::new();
                }
                self.initial_applied = true;
                self.state.local_player.group = group;
                self.state.local_player.color = color;
            }

            InboundMessage::HostUpdate { host_id } => {
                if !self.observed.contains(&host_id) {
                    warn!("host_update names unknown peer {}", host_id);
                    return Vec::new();
                }
                info!("Host is now {}", host_id);
                self.state.is_host = host_id == *self.local_id();
                self.state.host_id = Some(host_id);
            }

            InboundMessage::NavigateToGame => self.advance(GameScene::Lobby, GameScene::Tutorial),

            InboundMessage::NavigateToPlaying => {
                self.advance(GameScene::Tutorial, GameScene::Playing)
            }

            InboundMessage::Terminate { final_player_datas } => {
                if self.state.game_scene == GameScene::Awards {
                    debug!("Already in awards; ignoring terminate");
                    return Vec::new();
                }
                info!("Session terminated with {} results", final_player_datas.len());
                self.state.final_results = final_player_datas;
                self.state.game_scene = GameScene::Awards;
            }

            InboundMessage::TutorialInstruction { step, message } => {
                return self.on_tutorial(sender, &step, message);
            }

            InboundMessage::Move { .. }
            | InboundMessage::ManualMove { .. }
            | InboundMessage::StartGame { .. }
            | InboundMessage::Calibrated
            | InboundMessage::TutorialStepComplete { .. } => {}
        }
        Vec::new()
    }

    fn advance(&mut self, from: GameScene, to: GameScene) {
        if self.state.game_scene != from {
            debug!(
                "Ignoring transition to {} while in {}",
                to, self.state.game_scene
            );
            return;
        }
        info!("Scene {} -> {}", from, to);
        self.state.game_scene = to;
    }

    fn on_tutorial(
        &mut self,
        sender: &PeerId,
        step: &str,
        message: Option<String>,
    ) -> Vec<Outgoing> {
        let Some(parsed) = TutorialStep::parse(step) else {
            warn!("Unknown tutorial step {:?}", step);
            return Vec::new();
        };

        if self.sensor_supported {
            self.state.tutorial = Some(TutorialPrompt {
                step: parsed.as_str().to_owned(),
                message: message.unwrap_or_else(|| parsed.default_instruction().to_owned()),
            });
            return Vec::new();
        }

        let Some(vector) = parsed.cheat_vector() else {
            return Vec::new();
        };
        debug!("No sensor; completing tutorial step {} for {}", step, sender);
        vec![
            Outgoing::to(sender.clone(), OutboundMessage::Move { vector }),
            Outgoing::to(
                sender.clone(),
                OutboundMessage::TutorialStepComplete {
                    step: parsed.as_str().to_owned(),
                },
            ),
        ]
    }
}
