use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

use crate::signaling::SignalingLink;
use crate::transport::connection_wrapper::{PeerConnection, PeerEnvelope, PeerSignal};
use crate::transport::roster::{PeerTier, RosterTable};
use crate::transport::transport_config::{MediaOptions, TransportConfig};
use crate::transport::transport_event::{InboundFrame, SignalingState, TransportEvent};
use tilt_core::{IceServerConfig, MotionError, PeerId, SignalMessage};

pub(crate) enum PeerCommand {
    Send {
        payload: String,
        target: Option<PeerId>,
    },
    InitiateOffers,
    /// Tear everything down. `reason` is the final signaling state reported
    /// unless the loop already reported one.
    Shutdown {
        reason: SignalingState,
        done: oneshot::Sender<()>,
    },
}

pub(crate) type ReadySender = oneshot::Sender<Result<(), MotionError>>;

/// Hands out receipt timestamps in microseconds, strictly increasing even when
/// the wall clock stalls or steps back.
#[derive(Debug, Default)]
pub(crate) struct ReceiptClock {
    last: u64,
}

impl ReceiptClock {
    pub fn stamp(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        self.last = now.max(self.last + 1);
        self.last
    }
}

/// The transport actor. Owns the signaling link and every peer connection.
pub(crate) struct PeerLoop {
    local_id: PeerId,
    label: String,
    ice_servers: Vec<IceServerConfig>,
    media: MediaOptions,

    link: Option<SignalingLink>,
    ready: Option<ReadySender>,
    handshake_done: bool,
    signaling_state: SignalingState,

    connections: HashMap<PeerId, PeerConnection>,
    channels: HashMap<PeerId, Arc<RTCDataChannel>>,
    roster: RosterTable,
    next_generation: u64,
    clock: ReceiptClock,

    command_rx: mpsc::UnboundedReceiver<PeerCommand>,
    signal_rx: mpsc::UnboundedReceiver<PeerEnvelope>,
    signal_tx: mpsc::UnboundedSender<PeerEnvelope>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl PeerLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        local_id: PeerId,
        config: &TransportConfig,
        media: MediaOptions,
        link: SignalingLink,
        roster: RosterTable,
        ready: ReadySender,
        command_rx: mpsc::UnboundedReceiver<PeerCommand>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            local_id,
            label: config.data_channel_label.clone(),
            ice_servers: config.ice_servers.clone(),
            media,
            link: Some(link),
            ready: Some(ready),
            handshake_done: false,
            signaling_state: SignalingState::Connecting,
            connections: HashMap::new(),
            channels: HashMap::new(),
            roster,
            next_generation: 0,
            clock: ReceiptClock::default(),
            command_rx,
            signal_rx,
            signal_tx,
            events,
        }
    }

    pub async fn run(mut self) {
        info!("Transport loop started for {}", self.local_id);

        let register = SignalMessage::Register {
            peer_id: self.local_id.clone(),
        };
        if !self.signal(&register) {
            self.on_link_closed().await;
        }

        loop {
            if self.link.is_none() && !self.handshake_done {
                break;
            }

            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(PeerCommand::Shutdown { reason, done }) => {
                            self.teardown(reason).await;
                            let _ = done.send(());
                            break;
                        }
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Transport handle dropped. Shutting down.");
                            self.teardown(SignalingState::Closed).await;
                            break;
                        }
                    }
                }

                frame = next_frame(&mut self.link) => {
                    match frame {
                        Some(text) => self.handle_signal_frame(&text).await,
                        None => self.on_link_closed().await,
                    }
                }

                Some(envelope) = self.signal_rx.recv() => {
                    self.handle_peer_signal(envelope).await;
                }
            }
        }

        info!("Transport loop finished for {}", self.local_id);
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    fn set_signaling(&mut self, state: SignalingState) {
        if self.signaling_state != state {
            self.signaling_state = state;
            self.emit(TransportEvent::Signaling(state));
        }
    }

    fn signal(&self, msg: &SignalMessage) -> bool {
        match &self.link {
            Some(link) => link.send(msg),
            None => {
                debug!("Signaling link gone; dropping {:?}", msg);
                false
            }
        }
    }

    fn roster_changed(&self) {
        self.emit(TransportEvent::RosterChanged(self.roster.roster()));
    }

    async fn handle_command(&mut self, cmd: PeerCommand) {
        match cmd {
            PeerCommand::Send { payload, target } => self.send(&payload, target.as_ref()).await,
            PeerCommand::InitiateOffers => {
                for peer_id in self.roster.roster() {
                    if self.connections.contains_key(&peer_id) {
                        continue;
                    }
                    self.start_offer(peer_id).await;
                }
            }
            PeerCommand::Shutdown { .. } => {}
        }
    }

    async fn send(&self, payload: &str, target: Option<&PeerId>) {
        let targets = match target {
            Some(peer_id) => vec![peer_id.clone()],
            None => self.roster.open_channels(),
        };

        if targets.is_empty() {
            debug!("No open data channels; dropping outbound frame");
            return;
        }

        for peer_id in targets {
            let Some(channel) = self.channels.get(&peer_id) else {
                warn!("No open data channel to {}; dropping frame", peer_id);
                continue;
            };
            if let Err(e) = channel.send_text(payload.to_owned()).await {
                error!("Failed to send to {}: {:?}", peer_id, e);
            }
        }
    }

    async fn handle_signal_frame(&mut self, text: &str) {
        let msg = match serde_json::from_str::<SignalMessage>(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Dropping malformed signaling frame: {}", e);
                return;
            }
        };

        if let Some(to) = msg.target()
            && *to != self.local_id
        {
            debug!("Signaling envelope for {} ignored", to);
            return;
        }

        match msg {
            SignalMessage::Peers { peer_ids } => self.on_peers(peer_ids).await,

            SignalMessage::PeerJoined { peer_id } => {
                if peer_id == self.local_id || !self.roster.insert(&peer_id) {
                    return;
                }
                info!("Peer joined: {}", peer_id);
                self.roster_changed();
                if self.local_id < peer_id {
                    self.start_offer(peer_id).await;
                }
            }

            SignalMessage::PeerLeft { peer_id } => {
                info!("Peer left: {}", peer_id);
                if self.drop_peer(&peer_id).await {
                    self.roster_changed();
                }
            }

            SignalMessage::IceConfig { ice_servers } => {
                debug!("Relay supplied {} ICE servers", ice_servers.len());
                self.ice_servers = ice_servers;
            }

            SignalMessage::Offer { from, sdp, .. } => self.on_offer(from, sdp).await,

            SignalMessage::Answer { from, sdp, .. } => {
                let Some(conn) = self.connections.get_mut(&from) else {
                    debug!("Answer from {} without a pending offer", from);
                    return;
                };
                if !conn.local_offer_pending {
                    debug!("Unexpected answer from {}", from);
                    return;
                }
                if let Err(e) = conn.apply_answer(sdp).await {
                    self.peer_failed(&from, format!("{e:#}")).await;
                }
            }

            SignalMessage::IceCandidate {
                from, candidate, ..
            } => {
                let Some(conn) = self.connections.get_mut(&from) else {
                    debug!("ICE candidate from {} without a connection", from);
                    return;
                };
                if let Err(e) = conn.add_ice_candidate(&candidate).await {
                    warn!("Failed to add ICE candidate for {}: {:?}", from, e);
                }
            }

            SignalMessage::Register { .. } => {
                debug!("Ignoring register echo from relay");
            }
        }
    }

    async fn on_peers(&mut self, peer_ids: Vec<PeerId>) {
        let listed: Vec<PeerId> = peer_ids
            .into_iter()
            .filter(|id| *id != self.local_id)
            .collect();

        let mut changed = false;
        for gone in self.roster.roster() {
            if !listed.contains(&gone) {
                changed |= self.drop_peer(&gone).await;
            }
        }
        let mut fresh = Vec::new();
        for peer_id in listed {
            if self.roster.insert(&peer_id) {
                changed = true;
                fresh.push(peer_id);
            }
        }

        if !self.handshake_done {
            self.handshake_done = true;
            info!("Signaling handshake complete for {}", self.local_id);
            self.set_signaling(SignalingState::Open);
            if let Some(ready) = self.ready.take() {
                let _ = ready.send(Ok(()));
            }
        }
        if changed {
            self.roster_changed();
        }

        for peer_id in fresh {
            if self.local_id < peer_id {
                self.start_offer(peer_id).await;
            }
        }
    }

    async fn on_offer(&mut self, from: PeerId, sdp: String) {
        if from == self.local_id {
            return;
        }
        if self.roster.insert(&from) {
            self.roster_changed();
        }

        if let Some(existing) = self.connections.get(&from)
            && existing.local_offer_pending
            && self.local_id < from
        {
            info!("Offer collision with {}; keeping our own offer", from);
            return;
        }
        self.close_connection(&from).await;

        let mut conn = match self.open_connection(&from).await {
            Ok(conn) => conn,
            Err(detail) => return self.peer_failed(&from, detail).await,
        };
        match conn.accept_offer(sdp).await {
            Ok(answer) => {
                self.connections.insert(from.clone(), conn);
                self.signal(&SignalMessage::Answer {
                    from: self.local_id.clone(),
                    to: from,
                    sdp: answer,
                });
            }
            Err(e) => {
                let _ = conn.close().await;
                self.peer_failed(&from, format!("{e:#}")).await;
            }
        }
    }

    async fn start_offer(&mut self, peer_id: PeerId) {
        self.close_connection(&peer_id).await;

        let mut conn = match self.open_connection(&peer_id).await {
            Ok(conn) => conn,
            Err(detail) => return self.peer_failed(&peer_id, detail).await,
        };
        match conn.create_offer(&self.label).await {
            Ok(sdp) => {
                info!("Sending offer to {}", peer_id);
                self.connections.insert(peer_id.clone(), conn);
                self.signal(&SignalMessage::Offer {
                    from: self.local_id.clone(),
                    to: peer_id,
                    sdp,
                });
            }
            Err(e) => {
                let _ = conn.close().await;
                self.peer_failed(&peer_id, format!("{e:#}")).await;
            }
        }
    }

    async fn open_connection(&mut self, peer_id: &PeerId) -> Result<PeerConnection, String> {
        self.next_generation += 1;
        PeerConnection::new(
            peer_id.clone(),
            self.next_generation,
            &self.ice_servers,
            self.media,
            self.signal_tx.clone(),
        )
        .await
        .map_err(|e| format!("{e:#}"))
    }

    async fn handle_peer_signal(&mut self, envelope: PeerEnvelope) {
        let PeerEnvelope {
            peer_id,
            generation,
            signal,
        } = envelope;

        let current = self.connections.get(&peer_id).map(|c| c.generation);
        if current != Some(generation) {
            return;
        }

        match signal {
            PeerSignal::IceCandidate(candidate) => {
                self.signal(&SignalMessage::IceCandidate {
                    from: self.local_id.clone(),
                    to: peer_id,
                    candidate,
                });
            }

            PeerSignal::StateChanged(state) => match state {
                RTCPeerConnectionState::Connected => {
                    let resumed = self.roster.tier(&peer_id) == Some(PeerTier::Signaling)
                        && self.channels.contains_key(&peer_id);
                    if resumed {
                        info!("Connection to {} recovered", peer_id);
                        self.roster.set_tier(&peer_id, PeerTier::ChannelOpen);
                    } else if self.roster.tier(&peer_id) == Some(PeerTier::Signaling) {
                        self.roster.set_tier(&peer_id, PeerTier::Connected);
                    }
                    self.emit(TransportEvent::PeerConnected(peer_id.clone()));
                    if resumed {
                        self.emit(TransportEvent::DataChannelOpen(peer_id));
                    }
                }
                RTCPeerConnectionState::Disconnected => {
                    warn!("Connection to {} interrupted", peer_id);
                    if self.roster.interrupt(&peer_id) {
                        self.emit(TransportEvent::DataChannelClosed(peer_id));
                    }
                }
                RTCPeerConnectionState::Failed => {
                    self.peer_failed(&peer_id, "ICE connection failed".to_owned())
                        .await;
                }
                RTCPeerConnectionState::Closed => {
                    self.close_connection(&peer_id).await;
                }
                _ => {}
            },

            PeerSignal::ChannelOpen(channel) => {
                if !self.roster.contains(&peer_id) {
                    return;
                }
                self.channels.insert(peer_id.clone(), channel);
                self.roster.set_tier(&peer_id, PeerTier::ChannelOpen);
                self.emit(TransportEvent::DataChannelOpen(peer_id));
            }

            PeerSignal::ChannelClosed => {
                let was_open = self.roster.tier(&peer_id) == Some(PeerTier::ChannelOpen);
                if self.channels.remove(&peer_id).is_some() && was_open {
                    self.roster.set_tier(&peer_id, PeerTier::Connected);
                    self.emit(TransportEvent::DataChannelClosed(peer_id));
                }
            }

            PeerSignal::Message(payload) => {
                let received_at = self.clock.stamp();
                self.emit(TransportEvent::Message(InboundFrame {
                    peer_id,
                    payload,
                    received_at,
                }));
            }
        }
    }

    /// Close the connection to one peer without touching its roster entry.
    async fn close_connection(&mut self, peer_id: &PeerId) {
        let was_open = self.roster.tier(peer_id) == Some(PeerTier::ChannelOpen);
        if self.channels.remove(peer_id).is_some() && was_open {
            self.emit(TransportEvent::DataChannelClosed(peer_id.clone()));
        }
        if let Some(conn) = self.connections.remove(peer_id) {
            if let Err(e) = conn.close().await {
                debug!("Error closing connection to {}: {:?}", peer_id, e);
            }
        }
        if self.roster.contains(peer_id) {
            self.roster.set_tier(peer_id, PeerTier::Signaling);
        }
    }

    /// Forget a peer entirely. Returns true if it was on the roster.
    async fn drop_peer(&mut self, peer_id: &PeerId) -> bool {
        self.close_connection(peer_id).await;
        self.roster.remove(peer_id).is_some()
    }

    async fn peer_failed(&mut self, peer_id: &PeerId, detail: String) {
        warn!("Connection to {} failed: {}", peer_id, detail);
        self.close_connection(peer_id).await;
        self.emit(TransportEvent::PeerFailed {
            peer_id: peer_id.clone(),
            error: MotionError::peer_connection_failed(detail),
        });
    }

    async fn on_link_closed(&mut self) {
        self.link = None;
        if self.handshake_done {
            warn!("Signaling link closed; keeping established peer connections");
            self.set_signaling(SignalingState::Closed);
            return;
        }

        warn!("Signaling link closed before the roster arrived");
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(Err(MotionError::signaling_unavailable(
                "relay closed the connection mid-handshake",
            )));
        }
        self.teardown(SignalingState::Failed).await;
    }

    async fn teardown(&mut self, reason: SignalingState) {
        for peer_id in self.roster.open_channels() {
            if self.channels.remove(&peer_id).is_some() {
                self.emit(TransportEvent::DataChannelClosed(peer_id));
            }
        }
        for (peer_id, conn) in self.connections.drain() {
            if let Err(e) = conn.close().await {
                debug!("Error closing connection to {}: {:?}", peer_id, e);
            }
        }
        self.channels.clear();

        let had_peers = !self.roster.roster().is_empty();
        self.roster.clear();
        if had_peers {
            self.emit(TransportEvent::RosterChanged(Vec::new()));
        }

        self.link = None;
        if matches!(
            self.signaling_state,
            SignalingState::Connecting | SignalingState::Open
        ) {
            self.set_signaling(reason);
        }
    }
}

async fn next_frame(link: &mut Option<SignalingLink>) -> Option<String> {
    match link {
        Some(link) => link.recv().await,
        None => std::future::pending().await,
    }
}
