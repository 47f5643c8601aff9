use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Envelopes exchanged with the signaling relay.
///
/// The relay only routes these; it never carries game data. Handshake
/// envelopes are addressed with `from`/`to` so the relay can forward them
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum SignalMessage {
    /// Sent once by a client right after the socket opens.
    Register { peer_id: PeerId },
    /// Full roster of other registered peers, sent by the relay after `Register`.
    Peers { peer_ids: Vec<PeerId> },
    PeerJoined { peer_id: PeerId },
    PeerLeft { peer_id: PeerId },
    /// Relay-provided ICE servers, replacing the configured ones for new connections.
    IceConfig { ice_servers: Vec<IceServerConfig> },
    Offer { from: PeerId, to: PeerId, sdp: String },
    Answer { from: PeerId, to: PeerId, sdp: String },
    /// `candidate` is the JSON encoding of an ICE candidate init.
    IceCandidate {
        from: PeerId,
        to: PeerId,
        candidate: String,
    },
}

impl SignalMessage {
    /// Recipient of an addressed handshake envelope.
    pub fn target(&self) -> Option<&PeerId> {
        match self {
            SignalMessage::Offer { to, .. }
            | SignalMessage::Answer { to, .. }
            | SignalMessage::IceCandidate { to, .. } => Some(to),
            _ => None,
        }
    }
}
