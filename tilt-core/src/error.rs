use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure categories shared by the sensor, transport and session layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The capability (sensor, socket) is absent on this device.
    Unsupported,
    /// Sensor or media access was refused.
    PermissionDenied,
    /// The signaling relay was never reachable or dropped mid-handshake.
    SignalingUnavailable,
    /// Negotiation with one peer failed. Other peers are unaffected.
    PeerConnectionFailed,
    /// An inbound frame was malformed or carried an unknown `type`.
    ProtocolParseError,
    /// An awaited operation was superseded or aborted by teardown.
    Cancelled,
    /// The operation needs a prior step (e.g. `init`) that has not happened.
    NotReady,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::SignalingUnavailable => "signaling unavailable",
            ErrorKind::PeerConnectionFailed => "peer connection failed",
            ErrorKind::ProtocolParseError => "protocol parse error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::NotReady => "not ready",
        };
        f.write_str(name)
    }
}

/// Tagged `{kind, detail}` error value.
///
/// Components hand these out as return values or events; none of them is
/// ever raised across a component boundary as a panic.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct MotionError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl MotionError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, detail)
    }

    pub fn permission_denied(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, detail)
    }

    pub fn signaling_unavailable(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::SignalingUnavailable, detail)
    }

    pub fn peer_connection_failed(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::PeerConnectionFailed, detail)
    }

    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolParseError, detail)
    }

    pub fn cancelled(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, detail)
    }

    pub fn not_ready(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotReady, detail)
    }
}
