use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tilt_core::PeerId;

/// How far the connection to a remote peer has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PeerTier {
    /// Announced by the relay, no usable connection yet.
    Signaling,
    Connected,
    ChannelOpen,
}

#[derive(Debug, Clone, Copy)]
struct RosterEntry {
    tier: PeerTier,
    open_seq: u64,
}

/// Shared table of known peers. Written by the transport loop, read by
/// handles; reads always return fresh copies.
#[derive(Clone, Default)]
pub(crate) struct RosterTable {
    peers: Arc<DashMap<PeerId, RosterEntry>>,
    next_seq: Arc<AtomicU64>,
}

impl RosterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the peer was not known before.
    pub fn insert(&self, peer_id: &PeerId) -> bool {
        if self.peers.contains_key(peer_id) {
            return false;
        }
        self.peers.insert(
            peer_id.clone(),
            RosterEntry {
                tier: PeerTier::Signaling,
                open_seq: 0,
            },
        );
        true
    }

    pub fn remove(&self, peer_id: &PeerId) -> Option<PeerTier> {
        self.peers.remove(peer_id).map(|(_, e)| e.tier)
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn tier(&self, peer_id: &PeerId) -> Option<PeerTier> {
        self.peers.get(peer_id).map(|e| e.tier)
    }

    /// Move a peer to `tier`. Reaching `ChannelOpen` stamps the open order.
    pub fn set_tier(&self, peer_id: &PeerId, tier: PeerTier) {
        if let Some(mut entry) = self.peers.get_mut(peer_id) {
            if tier == PeerTier::ChannelOpen && entry.tier != PeerTier::ChannelOpen {
                entry.open_seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            }
            entry.tier = tier;
        }
    }

    /// Connectivity to a peer dropped. Moves it back to `Signaling` and
    /// returns true if it had an open channel.
    pub fn interrupt(&self, peer_id: &PeerId) -> bool {
        match self.peers.get_mut(peer_id) {
            Some(mut entry) => {
                let was_open = entry.tier == PeerTier::ChannelOpen;
                entry.tier = PeerTier::Signaling;
                was_open
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.peers.clear();
    }

    /// Every peer the relay currently reports, sorted by id.
    pub fn roster(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.peers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self
            .peers
            .iter()
            .filter(|e| e.value().tier >= PeerTier::Connected)
            .map(|e| e.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Peers with an open data channel, in the order their channels opened.
    pub fn open_channels(&self) -> Vec<PeerId> {
        let mut open: Vec<(u64, PeerId)> = self
            .peers
            .iter()
            .filter(|e| e.value().tier == PeerTier::ChannelOpen)
            .map(|e| (e.value().open_seq, e.key().clone()))
            .collect();
        open.sort();
        open.into_iter().map(|(_, id)| id).collect()
    }
}
