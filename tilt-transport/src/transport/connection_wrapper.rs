use crate::transport::transport_config::MediaOptions;
use anyhow::{Context, Result};
use std::default::Default;
use std::sync::Arc;
use tilt_core::{IceServerConfig, PeerId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

/// What a peer connection's callbacks report back to the transport loop.
pub(crate) enum PeerSignal {
    IceCandidate(String),
    StateChanged(RTCPeerConnectionState),
    ChannelOpen(Arc<RTCDataChannel>),
    ChannelClosed,
    Message(String),
}

/// A [`PeerSignal`] tagged with the connection attempt it came from, so the
/// loop can ignore callbacks of connections it already replaced.
pub(crate) struct PeerEnvelope {
    pub peer_id: PeerId,
    pub generation: u64,
    pub signal: PeerSignal,
}

/// One WebRTC connection to one remote peer.
pub(crate) struct PeerConnection {
    pub peer_id: PeerId,
    pub generation: u64,
    peer_connection: Arc<RTCPeerConnection>,
    signal_tx: mpsc::UnboundedSender<PeerEnvelope>,
    remote_description_set: bool,
    pending_candidates: Vec<RTCIceCandidateInit>,
    /// We sent an offer and are waiting for the answer.
    pub local_offer_pending: bool,
}

impl PeerConnection {
    pub async fn new(
        peer_id: PeerId,
        generation: u64,
        ice_servers: &[IceServerConfig],
        media: MediaOptions,
        signal_tx: mpsc::UnboundedSender<PeerEnvelope>,
    ) -> Result<Self> {
        // Codecs are registered even for data-only sessions; media transceivers need them.
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|s| RTCIceServer {
                    urls: s.urls.clone(),
                    username: s.username.clone().unwrap_or_default(),
                    credential: s.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        if let Some(direction) = media.direction() {
            for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
                peer_connection
                    .add_transceiver_from_kind(
                        kind,
                        Some(RTCRtpTransceiverInit {
                            direction,
                            send_encodings: vec![],
                        }),
                    )
                    .await
                    .context("Failed to add media transceiver")?;
            }
        }

        let state_tx = signal_tx.clone();
        let uid_state = peer_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                info!("Peer connection state for {}: {:?}", uid_state, s);
                let _ = state_tx.send(PeerEnvelope {
                    peer_id: uid_state.clone(),
                    generation,
                    signal: PeerSignal::StateChanged(s),
                });
                Box::pin(async {})
            },
        ));

        let ice_tx = signal_tx.clone();
        let uid_ice = peer_id.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let uid = uid_ice.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(json_candidate) = candidate.to_json() else {
                    return;
                };
                let Ok(str_candidate) = serde_json::to_string(&json_candidate) else {
                    return;
                };
                let _ = tx.send(PeerEnvelope {
                    peer_id: uid,
                    generation,
                    signal: PeerSignal::IceCandidate(str_candidate),
                });
            })
        }));

        // The answering side learns about the channel from the remote offer.
        let dc_tx = signal_tx.clone();
        let uid_dc = peer_id.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            debug!("Remote data channel '{}' for {}", dc.label(), uid_dc);
            watch_data_channel(&dc, uid_dc.clone(), generation, dc_tx.clone());
            Box::pin(async {})
        }));

        Ok(Self {
            peer_id,
            generation,
            peer_connection,
            signal_tx,
            remote_description_set: false,
            pending_candidates: Vec::new(),
            local_offer_pending: false,
        })
    }

    /// Open the data channel and produce a local offer.
    pub async fn create_offer(&mut self, label: &str) -> Result<String> {
        let dc = self
            .peer_connection
            .create_data_channel(label, None)
            .await
            .context("Failed to create data channel")?;
        watch_data_channel(
            &dc,
            self.peer_id.clone(),
            self.generation,
            self.signal_tx.clone(),
        );

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .context("Failed to set local offer")?;

        self.local_offer_pending = true;
        Ok(offer.sdp)
    }

    /// Apply a remote offer and produce the local answer.
    pub async fn accept_offer(&mut self, sdp: String) -> Result<String> {
        let desc = RTCSessionDescription::offer(sdp)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .context("Failed to set remote offer")?;
        self.remote_description_set = true;
        self.flush_candidates().await;

        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .context("Failed to set local answer")?;
        Ok(answer.sdp)
    }

    pub async fn apply_answer(&mut self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::answer(sdp)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .context("Failed to set remote answer")?;
        self.local_offer_pending = false;
        self.remote_description_set = true;
        self.flush_candidates().await;
        Ok(())
    }

    /// Add a trickled remote candidate, or hold it until a remote description exists.
    pub async fn add_ice_candidate(&mut self, candidate_json: &str) -> Result<()> {
        let candidate: RTCIceCandidateInit =
            serde_json::from_str(candidate_json).context("Failed to parse ICE candidate JSON")?;
        if !self.remote_description_set {
            self.pending_candidates.push(candidate);
            return Ok(());
        }
        self.peer_connection.add_ice_candidate(candidate).await?;
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }

    async fn flush_candidates(&mut self) {
        for candidate in self.pending_candidates.drain(..) {
            if let Err(e) = self.peer_connection.add_ice_candidate(candidate).await {
                debug!("Dropping queued ICE candidate for {}: {}", self.peer_id, e);
            }
        }
    }
}

fn watch_data_channel(
    dc: &Arc<RTCDataChannel>,
    peer_id: PeerId,
    generation: u64,
    tx: mpsc::UnboundedSender<PeerEnvelope>,
) {
    let open_tx = tx.clone();
    let open_uid = peer_id.clone();
    let channel_ready = dc.clone();
    dc.on_open(Box::new(move || {
        info!("Data channel open for {}", open_uid);
        let _ = open_tx.send(PeerEnvelope {
            peer_id: open_uid,
            generation,
            signal: PeerSignal::ChannelOpen(channel_ready),
        });
        Box::pin(async {})
    }));

    let close_tx = tx.clone();
    let close_uid = peer_id.clone();
    dc.on_close(Box::new(move || {
        let _ = close_tx.send(PeerEnvelope {
            peer_id: close_uid.clone(),
            generation,
            signal: PeerSignal::ChannelClosed,
        });
        Box::pin(async {})
    }));

    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        if let Some(text) = decode_frame(&peer_id, &msg.data) {
            let _ = tx.send(PeerEnvelope {
                peer_id: peer_id.clone(),
                generation,
                signal: PeerSignal::Message(text),
            });
        }
        Box::pin(async {})
    }));
}

/// Text payload of a data channel frame. Frames that are not valid UTF-8
/// are dropped.
fn decode_frame(peer_id: &PeerId, data: &[u8]) -> Option<String> {
    match std::str::from_utf8(data) {
        Ok(text) => Some(text.to_owned()),
        Err(e) => {
            warn!("Dropping non-UTF-8 frame from {}: {}", peer_id, e);
            None
        }
    }
}
