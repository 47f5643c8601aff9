use tilt_core::{MotionError, PeerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Connecting,
    Open,
    Closed,
    /// The relay never answered or dropped before the roster arrived.
    Failed,
}

/// A text frame received on a data channel.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub peer_id: PeerId,
    pub payload: String,
    /// Receipt time in microseconds since the UNIX epoch. Strictly increasing
    /// across all frames of one transport.
    pub received_at: u64,
}

/// Events the transport reports to its owner. Connection objects never leave
/// the transport; only peer ids and payloads do.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Signaling(SignalingState),
    /// ICE/DTLS connected for this peer.
    PeerConnected(PeerId),
    DataChannelOpen(PeerId),
    DataChannelClosed(PeerId),
    Message(InboundFrame),
    /// Current signaling roster, excluding the local peer.
    RosterChanged(Vec<PeerId>),
    /// Negotiation with one peer failed; the rest of the mesh is untouched.
    PeerFailed { peer_id: PeerId, error: MotionError },
}
