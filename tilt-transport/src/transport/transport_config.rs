use serde::{Deserialize, Serialize};
use std::time::Duration;
use tilt_core::IceServerConfig;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;

/// Transport settings, fixed for the lifetime of a [`PeerManager`](crate::PeerManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// How long `connect` waits for the relay's roster, in milliseconds.
    pub handshake_timeout: u64,
    pub data_channel_label: String,
}

impl TransportConfig {
    pub fn with_stun(stun_server: impl Into<String>) -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun(stun_server)],
            ..Self::default()
        }
    }

    /// Host candidates only. Enough for peers on the same machine or LAN.
    pub fn local_only() -> Self {
        Self {
            ice_servers: Vec::new(),
            ..Self::default()
        }
    }

    pub fn handshake_window(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun("stun:stun.l.google.com:19302")],
            handshake_timeout: 5000,
            data_channel_label: "data".to_owned(),
        }
    }
}

/// Whether audio/video transceivers are negotiated next to the data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaOptions {
    pub send: bool,
    pub receive: bool,
}

impl MediaOptions {
    pub const NONE: MediaOptions = MediaOptions {
        send: false,
        receive: false,
    };

    pub fn direction(&self) -> Option<RTCRtpTransceiverDirection> {
        match (self.send, self.receive) {
            (true, true) => Some(RTCRtpTransceiverDirection::Sendrecv),
            (true, false) => Some(RTCRtpTransceiverDirection::Sendonly),
            (false, true) => Some(RTCRtpTransceiverDirection::Recvonly),
            (false, false) => None,
        }
    }
}
