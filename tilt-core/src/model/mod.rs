mod peer;
mod protocol;
mod signaling;
mod vector;

pub use peer::PeerId;
pub use protocol::{FinalPlayerData, InboundMessage, OutboundMessage, TutorialStep};
pub use signaling::{IceServerConfig, SignalMessage};
pub use vector::Vector2;
