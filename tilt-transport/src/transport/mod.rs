mod connection_wrapper;
mod peer_loop;
mod peer_manager;
mod roster;
mod transport_config;
mod transport_event;

pub use peer_manager::PeerManager;
pub use roster::PeerTier;
pub use transport_config::{MediaOptions, TransportConfig};
pub use transport_event::{InboundFrame, SignalingState, TransportEvent};
