use async_trait::async_trait;
use tilt_core::PeerId;
use tilt_transport::PeerManager;

/// Where the coordinator writes encoded frames.
#[async_trait]
pub trait OutboundSink: Send + Sync {
    /// Send to one peer, or to every open channel when `target` is `None`.
    fn send(&self, payload: String, target: Option<&PeerId>);

    /// The id this sink announces to peers, if it has one of its own.
    fn local_id(&self) -> Option<PeerId> {
        None
    }

    /// Release the underlying connections.
    async fn close(&self);
}

#[async_trait]
impl OutboundSink for PeerManager {
    fn send(&self, payload: String, target: Option<&PeerId>) {
        PeerManager::send(self, payload, target);
    }

    fn local_id(&self) -> Option<PeerId> {
        Some(PeerManager::local_id(self).clone())
    }

    async fn close(&self) {
        self.disconnect().await;
    }
}
